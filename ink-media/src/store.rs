use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Datelike, Utc};
use tokio::sync::RwLock;

use crate::{MediaError, MediaResult};

/// Core blob storage operations - must be implemented by all storage backends
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a blob under `key`, replacing any previous one
    async fn put(&self, key: &str, content_type: Option<&str>, data: Bytes) -> MediaResult<PutResult>;

    async fn get(&self, key: &str) -> MediaResult<GetResult>;

    /// Whether a blob exists under `key`
    async fn exists(&self, key: &str) -> MediaResult<bool>;

    /// Delete a blob. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> MediaResult<()>;
}

/// Result of a successful put operation
#[derive(Debug, Clone)]
pub struct PutResult {
    pub size_bytes: u64,
}

/// Result of a get operation
#[derive(Debug, Clone)]
pub struct GetResult {
    pub data: Bytes,
    pub content_type: Option<String>,
}

/// Strategy for generating blob keys
pub trait BlobKeyStrategy: Send + Sync {
    fn object_key(&self, tenant_id: &str, stored_name: &str, at: DateTime<Utc>) -> String;
}

/// Default key strategy: tenant/year/month/stored_name
#[derive(Debug, Clone)]
pub struct DefaultKeyStrategy;

impl BlobKeyStrategy for DefaultKeyStrategy {
    fn object_key(&self, tenant_id: &str, stored_name: &str, at: DateTime<Utc>) -> String {
        format!("{}/{:04}/{:02}/{}", tenant_id, at.year(), at.month(), stored_name)
    }
}

/// Blobs kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, (Bytes, Option<String>)>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, content_type: Option<&str>, data: Bytes) -> MediaResult<PutResult> {
        let size_bytes = data.len() as u64;
        self.blobs
            .write()
            .await
            .insert(key.to_string(), (data, content_type.map(str::to_string)));
        Ok(PutResult { size_bytes })
    }

    async fn get(&self, key: &str) -> MediaResult<GetResult> {
        let blobs = self.blobs.read().await;
        let (data, content_type) = blobs.get(key).ok_or_else(|| MediaError::not_found(key))?;
        Ok(GetResult {
            data: data.clone(),
            content_type: content_type.clone(),
        })
    }

    async fn exists(&self, key: &str) -> MediaResult<bool> {
        Ok(self.blobs.read().await.contains_key(key))
    }

    async fn delete(&self, key: &str) -> MediaResult<()> {
        self.blobs.write().await.remove(key);
        Ok(())
    }
}

/// Blobs stored as files under a root directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Only plain relative keys map to paths under the root.
    fn path_for(&self, key: &str) -> MediaResult<PathBuf> {
        let rel = Path::new(key);
        let plain = !key.is_empty() && rel.components().all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(MediaError::invalid(format!("Invalid blob key: {key}")));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, _content_type: Option<&str>, data: Bytes) -> MediaResult<PutResult> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &data).await?;
        Ok(PutResult {
            size_bytes: data.len() as u64,
        })
    }

    async fn get(&self, key: &str) -> MediaResult<GetResult> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(GetResult {
                data: Bytes::from(data),
                content_type: None,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(MediaError::not_found(key)),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> MediaResult<bool> {
        let path = self.path_for(key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    async fn delete(&self, key: &str) -> MediaResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn default_keys_are_tenant_year_month() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap();
        assert_eq!(DefaultKeyStrategy.object_key("7", "a.png", at), "7/2024/03/a.png");
    }

    #[tokio::test]
    async fn memory_store_roundtrip_and_delete() {
        let store = MemoryBlobStore::new();
        store.put("1/a.txt", Some("text/plain"), Bytes::from_static(b"hi")).await.unwrap();
        assert!(store.exists("1/a.txt").await.unwrap());

        let got = store.get("1/a.txt").await.unwrap();
        assert_eq!(&got.data[..], b"hi");
        assert_eq!(got.content_type.as_deref(), Some("text/plain"));

        store.delete("1/a.txt").await.unwrap();
        assert!(matches!(store.get("1/a.txt").await, Err(MediaError::NotFound { .. })));
        assert!(store.delete("1/a.txt").await.is_ok());
    }

    #[tokio::test]
    async fn fs_store_writes_under_root() {
        let root = std::env::temp_dir().join(format!("ink-media-{}", uuid::Uuid::new_v4()));
        let store = FsBlobStore::new(&root);

        store.put("1/2024/01/a.txt", None, Bytes::from_static(b"x")).await.unwrap();
        assert!(root.join("1/2024/01/a.txt").exists());
        assert_eq!(&store.get("1/2024/01/a.txt").await.unwrap().data[..], b"x");

        store.delete("1/2024/01/a.txt").await.unwrap();
        assert!(!store.exists("1/2024/01/a.txt").await.unwrap());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn fs_store_refuses_escaping_keys() {
        let store = FsBlobStore::new(std::env::temp_dir());
        for key in ["../x", "/etc/passwd", "a/../../b", ""] {
            assert!(matches!(
                store.put(key, None, Bytes::new()).await,
                Err(MediaError::Invalid { .. })
            ));
        }
    }
}
