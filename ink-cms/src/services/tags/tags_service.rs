use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use ink_core::errors::InkError;
use ink_core::{InkService, ServiceCapabilities, TenantContext};
use serde_json::Value;

use crate::services::shared::{paginate, require_id, MAX_PER_PAGE};
use crate::services::CmsParams;
use crate::store::{parse_id, CmsState};
use crate::text::{slugify, TAG_SLUG_MAX};
use crate::validate::{clean, validate};

use super::tags_schema::{CreateTag, PatchTag, ERROR_MESSAGE};
use super::tags_shared;

pub struct TagsService {
    state: Arc<CmsState>,
}

impl TagsService {
    pub fn new(state: Arc<CmsState>) -> Self {
        Self { state }
    }
}

fn slug_or_invalid(name: &str) -> Result<String> {
    let slug = slugify(name, TAG_SLUG_MAX);
    if slug.is_empty() {
        return Err(InkError::unprocessable(ERROR_MESSAGE)
            .with_errors(serde_json::json!({"name": ["must contain letters or numbers"]}))
            .into_anyhow());
    }
    Ok(slug)
}

#[async_trait]
impl InkService<Value, CmsParams> for TagsService {
    fn capabilities(&self) -> ServiceCapabilities {
        tags_shared::capabilities()
    }

    /// Most used first; `?q=` filters on the name.
    async fn find(&self, ctx: &TenantContext, params: CmsParams) -> Result<Vec<Value>> {
        params.caller()?;
        let needle = params.query_str("q").map(str::to_lowercase);

        let mut tags = self
            .state
            .tags
            .find(ctx, |t| {
                needle
                    .as_deref()
                    .map_or(true, |q| t.name.to_lowercase().contains(q))
            })
            .await?;
        tags.sort_by(|a, b| {
            b.use_count
                .cmp(&a.use_count)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });

        Ok(paginate(tags, &params, MAX_PER_PAGE)
            .iter()
            .map(|t| t.to_json())
            .collect())
    }

    async fn get(&self, ctx: &TenantContext, id: &str, params: CmsParams) -> Result<Value> {
        params.caller()?;
        let id = parse_id("Tag", id)?;
        Ok(self.state.tags.require(ctx, id).await?.to_json())
    }

    async fn create(&self, ctx: &TenantContext, data: Value, params: CmsParams) -> Result<Value> {
        params.caller()?;
        let input: CreateTag = validate(&data, ERROR_MESSAGE)?;
        let slug = slug_or_invalid(&input.name)?;

        let tag = self
            .state
            .tags
            .insert_with(ctx, |id, rows| {
                if rows.values().any(|t| t.slug == slug || t.name.eq_ignore_ascii_case(input.name.trim())) {
                    return Err(InkError::conflict("Tag already exists").into_anyhow());
                }
                let mut tag = tags_shared::new_tag(ctx, id, &input.name, slug.clone(), Utc::now());
                tag.description = clean(input.description.clone());
                if let Some(color) = clean(input.color.clone()) {
                    tag.color = color;
                }
                Ok(tag)
            })
            .await?;

        Ok(tag.to_json())
    }

    async fn patch(&self, ctx: &TenantContext, id: Option<&str>, data: Value, _params: CmsParams) -> Result<Value> {
        let id = parse_id("Tag", require_id("Tag", id)?)?;
        let input: PatchTag = validate(&data, ERROR_MESSAGE)?;
        let slug = input.name.as_deref().map(slug_or_invalid).transpose()?;

        let tag = self
            .state
            .tags
            .update_with(ctx, id, |tag, rows| {
                if let (Some(name), Some(slug)) = (input.name.as_deref(), slug) {
                    if rows.values().any(|t| t.slug == slug) {
                        return Err(InkError::conflict("Tag already exists").into_anyhow());
                    }
                    tag.name = name.trim().to_string();
                    tag.slug = slug;
                }
                if let Some(description) = input.description {
                    tag.description = clean(Some(description));
                }
                if let Some(color) = clean(input.color) {
                    tag.color = color;
                }
                tag.updated_at = Utc::now();
                Ok(())
            })
            .await?;

        Ok(tag.to_json())
    }

    /// Admin only; the tag is detached from every post first.
    async fn remove(&self, ctx: &TenantContext, id: Option<&str>, _params: CmsParams) -> Result<Value> {
        let id = parse_id("Tag", require_id("Tag", id)?)?;
        self.state.tags.require(ctx, id).await?;

        let detached = self
            .state
            .posts
            .update_all(ctx, |post| {
                let before = post.tag_ids.len();
                post.tag_ids.retain(|t| *t != id);
                post.tag_ids.len() != before
            })
            .await?;

        let tag = self.state.tags.remove(ctx, id).await?;
        tracing::info!(tenant = %ctx.tenant_id, tag = id, detached, "tag removed");
        Ok(tag.to_json())
    }
}
