use anyhow::Result;
use async_trait::async_trait;
use ink_core::errors::InkError;
use ink_core::hooks::{HookContext, HookResult, InkAfterHook, InkBeforeHook};
use serde_json::{json, Value};

use crate::services::CmsParams;

use super::posts_schema::ERROR_MESSAGE;

/// A `category_id` on the incoming post must name a category of the
/// same tenant.
pub struct ValidatePostCategory;

#[async_trait]
impl InkBeforeHook<Value, CmsParams> for ValidatePostCategory {
    async fn run(&self, ctx: &mut HookContext<Value, CmsParams>) -> Result<()> {
        let Some(category_id) = ctx.data.as_ref().and_then(|d| d.get("category_id")) else {
            return Ok(());
        };
        // Nulls clear the category; other shapes are left to the schema.
        let Some(category_id) = category_id.as_u64() else {
            return Ok(());
        };

        let categories = ctx.services.service::<Value, CmsParams>("categories")?;
        let found = categories
            .get(&ctx.tenant, &category_id.to_string(), CmsParams::system())
            .await;
        if found.is_err() {
            return Err(InkError::unprocessable(ERROR_MESSAGE)
                .with_errors(json!({"category_id": ["Category not found"]}))
                .into_anyhow());
        }

        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Expand {
    author: bool,
    category: bool,
    tags: bool,
}

fn requested_expansions(ctx: &HookContext<Value, CmsParams>) -> Expand {
    let raw = ctx
        .params
        .query_str("expand")
        .map(str::to_string)
        .or_else(|| ctx.config.get_string("posts.expand"))
        .unwrap_or_default();

    let mut expand = Expand::default();
    for part in raw.split(',').map(str::trim) {
        match part {
            "author" => expand.author = true,
            "category" => expand.category = true,
            "tags" => expand.tags = true,
            _ => {}
        }
    }
    expand
}

async fn related(ctx: &HookContext<Value, CmsParams>, service: &str, id: u64) -> Result<Option<Value>> {
    let svc = ctx.services.service::<Value, CmsParams>(service)?;
    Ok(svc
        .get(&ctx.tenant, &id.to_string(), CmsParams::system())
        .await
        .ok())
}

async fn expand_one(ctx: &HookContext<Value, CmsParams>, expand: Expand, mut v: Value) -> Result<Value> {
    let author_id = v.get("author_id").and_then(Value::as_u64);
    let category_id = v.get("category_id").and_then(Value::as_u64);
    let tag_ids: Vec<u64> = v
        .get("tag_ids")
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(Value::as_u64).collect())
        .unwrap_or_default();

    let Some(obj) = v.as_object_mut() else {
        return Ok(v);
    };

    if expand.author {
        if let Some(author) = match author_id {
            Some(id) => related(ctx, "users", id).await?,
            None => None,
        } {
            obj.insert("author".to_string(), author);
        }
    }

    if expand.category {
        let category = match category_id {
            Some(id) => related(ctx, "categories", id).await?,
            None => None,
        };
        obj.insert("category".to_string(), category.unwrap_or(Value::Null));
    }

    if expand.tags {
        let mut tags = Vec::with_capacity(tag_ids.len());
        for id in tag_ids {
            if let Some(tag) = related(ctx, "tags", id).await? {
                tags.push(tag);
            }
        }
        obj.insert("tags".to_string(), Value::Array(tags));
    }

    Ok(v)
}

/// `?expand=author,category,tags` embeds the related records; the
/// `posts.expand` config key sets a default.
pub struct ExpandPostRelations;

#[async_trait]
impl InkAfterHook<Value, CmsParams> for ExpandPostRelations {
    async fn run(&self, ctx: &mut HookContext<Value, CmsParams>) -> Result<()> {
        let expand = requested_expansions(ctx);
        if !(expand.author || expand.category || expand.tags) {
            return Ok(());
        }

        let Some(res) = ctx.result.take() else {
            return Ok(());
        };

        ctx.result = Some(match res {
            HookResult::One(v) => HookResult::One(expand_one(ctx, expand, v).await?),
            HookResult::Many(vs) => {
                let mut out = Vec::with_capacity(vs.len());
                for v in vs {
                    out.push(expand_one(ctx, expand, v).await?);
                }
                HookResult::Many(out)
            }
        });

        Ok(())
    }
}
