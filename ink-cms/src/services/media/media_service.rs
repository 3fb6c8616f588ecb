use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use ink_core::errors::InkError;
use ink_core::{InkService, ServiceCapabilities, TenantContext};
use ink_media::{FileKind, MediaAdapter, MediaError};
use serde_json::Value;

use crate::models::MediaFile;
use crate::services::shared::{paginate, require_id};
use crate::services::{Caller, CmsParams};
use crate::store::{parse_id, CmsState};
use crate::validate::{clean, validate};

use super::media_schema::{PatchMedia, ERROR_MESSAGE};
use super::media_shared;

pub struct MediaService {
    state: Arc<CmsState>,
    media: MediaAdapter,
    per_page: usize,
}

impl MediaService {
    pub fn new(state: Arc<CmsState>, media: MediaAdapter, per_page: usize) -> Self {
        Self { state, media, per_page }
    }

    /// Uploader or admin.
    fn check_owner(caller: &Caller<'_>, file: &MediaFile) -> Result<()> {
        match caller {
            Caller::User(p) if !p.is_admin() && p.user_id != file.uploaded_by => {
                Err(InkError::forbidden("You can only change your own uploads").into_anyhow())
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl InkService<Value, CmsParams> for MediaService {
    fn capabilities(&self) -> ServiceCapabilities {
        media_shared::capabilities()
    }

    /// Newest first; `?type=image|video|audio|document|other` and `?q=`
    /// (file name or title) filter.
    async fn find(&self, ctx: &TenantContext, params: CmsParams) -> Result<Vec<Value>> {
        params.caller()?;
        let kind = match params.query_str("type") {
            Some(raw) => Some(
                FileKind::parse(raw)
                    .ok_or_else(|| InkError::bad_request(format!("Unknown media type '{raw}'")).into_anyhow())?,
            ),
            None => None,
        };
        let needle = params.query_str("q").map(str::to_lowercase);

        let mut files = self
            .state
            .media
            .find(ctx, |f| {
                kind.map_or(true, |k| f.file_type == k)
                    && needle.as_deref().map_or(true, |q| {
                        f.original_filename.to_lowercase().contains(q)
                            || f.title.as_deref().is_some_and(|t| t.to_lowercase().contains(q))
                    })
            })
            .await?;
        files.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(paginate(files, &params, self.per_page)
            .iter()
            .map(|f| f.to_json())
            .collect())
    }

    async fn get(&self, ctx: &TenantContext, id: &str, params: CmsParams) -> Result<Value> {
        params.caller()?;
        let id = parse_id("Media file", id)?;
        Ok(self.state.media.require(ctx, id).await?.to_json())
    }

    async fn patch(&self, ctx: &TenantContext, id: Option<&str>, data: Value, params: CmsParams) -> Result<Value> {
        let caller = params.caller()?;
        let id = parse_id("Media file", require_id("Media file", id)?)?;
        let input: PatchMedia = validate(&data, ERROR_MESSAGE)?;

        let file = self
            .state
            .media
            .update_with(ctx, id, |file, _| {
                Self::check_owner(&caller, file)?;
                if let Some(title) = input.title {
                    file.title = clean(Some(title));
                }
                if let Some(alt) = input.alt_text {
                    file.alt_text = clean(Some(alt));
                }
                if let Some(description) = input.description {
                    file.description = clean(Some(description));
                }
                file.updated_at = Utc::now();
                Ok(())
            })
            .await?;

        Ok(file.to_json())
    }

    /// Deletes the blob, then the record.
    async fn remove(&self, ctx: &TenantContext, id: Option<&str>, params: CmsParams) -> Result<Value> {
        let caller = params.caller()?;
        let id = parse_id("Media file", require_id("Media file", id)?)?;
        let file = self.state.media.require(ctx, id).await?;
        Self::check_owner(&caller, &file)?;

        self.media
            .delete(&file.storage_key)
            .await
            .map_err(MediaError::into_anyhow)?;
        let file = self.state.media.remove(ctx, id).await?;

        tracing::info!(tenant = %ctx.tenant_id, media = id, key = %file.storage_key, "media removed");
        Ok(file.to_json())
    }
}
