use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::filename::{extension_of, stored_filename};
use crate::kind::FileKind;
use crate::store::{BlobKeyStrategy, BlobStore, DefaultKeyStrategy, GetResult};
use crate::{MediaConfig, MediaError, MediaResult};

/// One file as received from a client.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub original_filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Where and what an accepted upload was stored as.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StoredMedia {
    pub filename: String,
    pub original_filename: String,
    pub storage_key: String,
    pub file_url: String,
    pub file_size: u64,
    pub mime_type: String,
    pub file_type: FileKind,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Validates uploads and stores them under tenant scoped keys.
///
/// Services embed one adapter; it knows nothing about HTTP or records.
#[derive(Clone)]
pub struct MediaAdapter {
    store: Arc<dyn BlobStore>,
    keys: Arc<dyn BlobKeyStrategy>,
    config: MediaConfig,
}

impl MediaAdapter {
    pub fn new<S: BlobStore + 'static>(store: S, config: MediaConfig) -> Self {
        Self::from_arc(Arc::new(store), config)
    }

    pub fn from_arc(store: Arc<dyn BlobStore>, config: MediaConfig) -> Self {
        Self {
            store,
            keys: Arc::new(DefaultKeyStrategy),
            config,
        }
    }

    pub fn with_key_strategy<K: BlobKeyStrategy + 'static>(mut self, keys: K) -> Self {
        self.keys = Arc::new(keys);
        self
    }

    pub fn config(&self) -> &MediaConfig {
        &self.config
    }

    /// Check name, extension and size. Returns the lowercase extension.
    pub fn validate(&self, filename: &str, size: u64) -> MediaResult<String> {
        if filename.trim().is_empty() {
            return Err(MediaError::NoFilename);
        }
        let ext = extension_of(filename);
        match ext {
            Some(ext) if self.config.allows_extension(&ext) => {
                if size > self.config.max_file_bytes {
                    return Err(MediaError::TooLarge {
                        size,
                        max: self.config.max_file_bytes,
                    });
                }
                Ok(ext)
            }
            other => Err(MediaError::TypeNotAllowed { extension: other }),
        }
    }

    pub async fn store_upload(&self, tenant_id: &str, upload: MediaUpload) -> MediaResult<StoredMedia> {
        self.store_upload_at(tenant_id, upload, Utc::now()).await
    }

    pub async fn store_upload_at(
        &self,
        tenant_id: &str,
        upload: MediaUpload,
        at: DateTime<Utc>,
    ) -> MediaResult<StoredMedia> {
        let ext = self.validate(&upload.original_filename, upload.data.len() as u64)?;

        let mut filename = stored_filename(&upload.original_filename, at);
        let mut key = self.keys.object_key(tenant_id, &filename, at);
        if self.store.exists(&key).await? {
            // Same name within the same second
            let suffix = uuid::Uuid::new_v4().simple().to_string();
            filename = format!("{}_{}", &suffix[..8], filename);
            key = self.keys.object_key(tenant_id, &filename, at);
        }

        let mime_type = upload
            .content_type
            .as_deref()
            .map(str::trim)
            .filter(|ct| !ct.is_empty() && *ct != "application/octet-stream")
            .map(str::to_string)
            .unwrap_or_else(|| mime_guess::from_ext(&ext).first_or_octet_stream().essence_str().to_string());
        let file_type = FileKind::from_mime(&mime_type);

        let (width, height) = match file_type {
            FileKind::Image => image_dimensions(&upload.data).map_or((None, None), |(w, h)| (Some(w), Some(h))),
            _ => (None, None),
        };

        let put = self.store.put(&key, Some(&mime_type), upload.data).await?;
        tracing::info!(tenant = %tenant_id, key = %key, bytes = put.size_bytes, "media stored");

        Ok(StoredMedia {
            file_url: self.config.url_for(&key),
            filename,
            original_filename: upload.original_filename,
            storage_key: key,
            file_size: put.size_bytes,
            mime_type,
            file_type,
            width,
            height,
        })
    }

    pub async fn open(&self, key: &str) -> MediaResult<GetResult> {
        self.store.get(key).await
    }

    pub async fn delete(&self, key: &str) -> MediaResult<()> {
        self.store.delete(key).await
    }
}

/// Width and height of an encoded image, when its header can be read.
pub fn image_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    image::io::Reader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::store::MemoryBlobStore;

    // 1x1 transparent PNG
    const PNG_1X1: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
        0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
        0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
        0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
        0x42, 0x60, 0x82,
    ];

    fn adapter() -> MediaAdapter {
        MediaAdapter::new(MemoryBlobStore::new(), MediaConfig::default().with_max_file_bytes(1024))
    }

    fn upload(name: &str, ct: Option<&str>, data: &'static [u8]) -> MediaUpload {
        MediaUpload {
            original_filename: name.to_string(),
            content_type: ct.map(str::to_string),
            data: Bytes::from_static(data),
        }
    }

    #[test]
    fn validation_errors_carry_the_client_messages() {
        let a = adapter();
        assert_eq!(a.validate("", 1).unwrap_err().to_string(), "No file selected");
        assert_eq!(a.validate("x.exe", 1).unwrap_err().to_string(), "File type not allowed");
        assert_eq!(a.validate("noext", 1).unwrap_err().to_string(), "File type not allowed");
        assert!(matches!(a.validate("x.png", 2048), Err(MediaError::TooLarge { .. })));
        assert_eq!(a.validate("X.PNG", 10).unwrap(), "png");
    }

    #[tokio::test]
    async fn images_are_stored_with_dimensions() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let stored = adapter()
            .store_upload_at("3", upload("My Pic.png", Some("image/png"), PNG_1X1), at)
            .await
            .unwrap();

        assert_eq!(stored.filename, "20240501_120000_My_Pic.png");
        assert_eq!(stored.storage_key, "3/2024/05/20240501_120000_My_Pic.png");
        assert_eq!(stored.file_url, "/uploads/3/2024/05/20240501_120000_My_Pic.png");
        assert_eq!(stored.file_type, FileKind::Image);
        assert_eq!((stored.width, stored.height), (Some(1), Some(1)));
        assert_eq!(stored.original_filename, "My Pic.png");
    }

    #[tokio::test]
    async fn broken_images_still_upload_without_dimensions() {
        let stored = adapter()
            .store_upload("3", upload("a.jpg", None, b"not really a jpeg"))
            .await
            .unwrap();
        assert_eq!(stored.mime_type, "image/jpeg");
        assert_eq!(stored.width, None);
    }

    #[tokio::test]
    async fn same_second_uploads_do_not_overwrite() {
        let a = adapter();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let first = a.store_upload_at("3", upload("a.pdf", None, b"1"), at).await.unwrap();
        let second = a.store_upload_at("3", upload("a.pdf", None, b"2"), at).await.unwrap();

        assert_ne!(first.storage_key, second.storage_key);
        assert_eq!(&a.open(&first.storage_key).await.unwrap().data[..], b"1");
        assert_eq!(second.file_type, FileKind::Document);
    }

    #[tokio::test]
    async fn missing_or_generic_content_types_are_guessed_from_the_name() {
        let a = MediaAdapter::new(MemoryBlobStore::new(), MediaConfig::default());
        let clip = a.store_upload("3", upload("clip.MOV", None, b"..")).await.unwrap();
        assert_eq!(clip.mime_type, "video/quicktime");
        assert_eq!(clip.file_type, FileKind::Video);

        let letter = a
            .store_upload("3", upload("q3.docx", Some("application/octet-stream"), b".."))
            .await
            .unwrap();
        assert_eq!(letter.mime_type, "application/vnd.openxmlformats-officedocument.wordprocessingml.document");
        assert_eq!(letter.file_type, FileKind::Document);

        let told = a.store_upload("3", upload("a.mp4", Some("video/x-custom"), b"..")).await.unwrap();
        assert_eq!(told.mime_type, "video/x-custom");
    }
}
