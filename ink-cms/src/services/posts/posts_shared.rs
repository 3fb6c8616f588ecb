use std::sync::Arc;

use ink_core::{InkApp, ServiceMethodKind};
use serde_json::Value;

use crate::services::CmsParams;

pub use crate::services::shared::crud_capabilities;

pub fn register_hooks(app: &InkApp<Value, CmsParams>) -> anyhow::Result<()> {
    app.service("posts")?.hooks(|h| {
        h.before_create(Arc::new(super::posts_hooks::ValidatePostCategory));
        h.before_update(Arc::new(super::posts_hooks::ValidatePostCategory));
        h.before_patch(Arc::new(super::posts_hooks::ValidatePostCategory));

        h.after_find(Arc::new(super::posts_hooks::ExpandPostRelations));
        h.after(ServiceMethodKind::Get, Arc::new(super::posts_hooks::ExpandPostRelations));
    });
    Ok(())
}
