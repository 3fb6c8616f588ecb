use chrono::{DateTime, Utc};
use ink_core::TenantId;
use ink_media::{format_file_size, FileKind, StoredMedia};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::ts;

/// Record of an uploaded file. The bytes live in the blob store under
/// `storage_key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    pub id: u64,
    pub tenant_id: TenantId,
    pub uploaded_by: u64,
    pub filename: String,
    pub original_filename: String,
    pub storage_key: String,
    pub file_url: String,
    pub file_size: u64,
    pub mime_type: String,
    pub file_type: FileKind,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub title: Option<String>,
    pub alt_text: Option<String>,
    pub description: Option<String>,
    pub usage_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaFile {
    pub fn from_stored(
        id: u64,
        tenant_id: TenantId,
        uploaded_by: u64,
        stored: StoredMedia,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            uploaded_by,
            filename: stored.filename,
            original_filename: stored.original_filename,
            storage_key: stored.storage_key,
            file_url: stored.file_url,
            file_size: stored.file_size,
            mime_type: stored.mime_type,
            file_type: stored.file_type,
            width: stored.width,
            height: stored.height,
            title: None,
            alt_text: None,
            description: None,
            usage_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// `1920x1080` for images with known dimensions.
    pub fn dimensions(&self) -> Option<String> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some(format!("{w}x{h}")),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "uploaded_by": self.uploaded_by,
            "filename": self.filename,
            "original_filename": self.original_filename,
            "file_url": self.file_url,
            "file_size": self.file_size,
            "file_size_formatted": format_file_size(self.file_size),
            "mime_type": self.mime_type,
            "file_type": self.file_type,
            "width": self.width,
            "height": self.height,
            "dimensions": self.dimensions(),
            "title": self.title,
            "alt_text": self.alt_text,
            "description": self.description,
            "usage_count": self.usage_count,
            "is_image": self.file_type == FileKind::Image,
            "is_video": self.file_type == FileKind::Video,
            "is_document": self.file_type == FileKind::Document,
            "created_at": ts(&self.created_at),
            "updated_at": ts(&self.updated_at),
        })
    }
}
