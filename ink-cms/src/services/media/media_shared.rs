use anyhow::Result;
use chrono::Utc;
use ink_core::{ServiceCapabilities, ServiceMethodKind, TenantContext};
use ink_media::{MediaAdapter, MediaError, MediaUpload};

use crate::models::MediaFile;
use crate::store::CmsState;

/// Records are created by the upload route, never through REST.
pub fn capabilities() -> ServiceCapabilities {
    ServiceCapabilities::from_methods(vec![
        ServiceMethodKind::Find,
        ServiceMethodKind::Get,
        ServiceMethodKind::Patch,
        ServiceMethodKind::Remove,
    ])
}

/// Validate and store one upload, then record it for the tenant.
///
/// The blob is deleted again when the record can't be written.
pub async fn record_upload(
    state: &CmsState,
    media: &MediaAdapter,
    ctx: &TenantContext,
    uploaded_by: u64,
    upload: MediaUpload,
) -> Result<MediaFile> {
    let stored = media
        .store_upload(ctx.tenant_id.as_str(), upload)
        .await
        .map_err(MediaError::into_anyhow)?;
    let key = stored.storage_key.clone();

    let recorded = state
        .media
        .insert_with(ctx, |id, _| {
            Ok(MediaFile::from_stored(id, ctx.tenant_id.clone(), uploaded_by, stored, Utc::now()))
        })
        .await;

    match recorded {
        Ok(file) => Ok(file),
        Err(e) => {
            if let Err(cleanup) = media.delete(&key).await {
                tracing::warn!(%key, error = %cleanup, "orphaned blob after failed insert");
            }
            Err(e)
        }
    }
}

/// Delete the blobs of every media record of a tenant; returns how many
/// were removed.
pub async fn delete_tenant_blobs(state: &CmsState, media: &MediaAdapter, ctx: &TenantContext) -> Result<usize> {
    let mut deleted = 0;
    for file in state.media.find(ctx, |_| true).await? {
        match media.delete(&file.storage_key).await {
            Ok(()) => deleted += 1,
            Err(e) => tracing::warn!(key = %file.storage_key, error = %e, "blob delete failed"),
        }
    }
    Ok(deleted)
}
