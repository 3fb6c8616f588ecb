//! Server-side HTML for the public site.
//!
//! Templates are compiled into the binary and rendered with handlebars.
//! Every `{{value}}` goes through [`escape_html`]; post bodies, which are
//! HTML already, use `{{safe_content ...}}` and are sanitized instead.

use anyhow::Result;
use handlebars::{Context, Handlebars, Helper, HelperResult, Output, RenderContext};
use ink_core::errors::InkError;
use serde_json::Value;

use crate::text::{escape_html, sanitize_html};

const TEMPLATES: &[(&str, &str)] = &[
    ("index", include_str!("../templates/index.hbs")),
    ("post", include_str!("../templates/post.hbs")),
    ("listing", include_str!("../templates/listing.hbs")),
    ("archive", include_str!("../templates/archive.hbs")),
    ("not_found", include_str!("../templates/not_found.hbs")),
];

const PARTIALS: &[(&str, &str)] = &[
    ("layout", include_str!("../templates/layout.hbs")),
    ("post_card", include_str!("../templates/post_card.hbs")),
    ("pager", include_str!("../templates/pager.hbs")),
];

fn safe_content(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let html = h.param(0).and_then(|p| p.value().as_str()).unwrap_or_default();
    out.write(&sanitize_html(html))?;
    Ok(())
}

pub struct Renderer {
    hb: Handlebars<'static>,
}

impl Renderer {
    pub fn new() -> Result<Self> {
        let mut hb = Handlebars::new();
        hb.register_escape_fn(escape_html);
        hb.register_helper("safe_content", Box::new(safe_content));

        for (name, source) in PARTIALS {
            hb.register_partial(name, *source)
                .map_err(|e| anyhow::anyhow!("partial '{name}': {e}"))?;
        }
        for (name, source) in TEMPLATES {
            hb.register_template_string(name, *source)
                .map_err(|e| anyhow::anyhow!("template '{name}': {e}"))?;
        }
        Ok(Self { hb })
    }

    pub fn render(&self, template: &str, data: &Value) -> Result<String> {
        self.hb.render(template, data).map_err(|e| {
            InkError::general_error(format!("Failed to render '{template}'"))
                .with_source(anyhow::anyhow!("{e}"))
                .into_anyhow()
        })
    }
}
