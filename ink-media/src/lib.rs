//! # ink-media: upload handling for Inkwell
//!
//! Validates uploaded files against an extension allow-list and a size
//! limit, stores them under tenant scoped keys and classifies them.
//!
//! ```text
//! ┌─────────────────┐
//! │  Media service  │  ← records, permissions
//! ├─────────────────┤
//! │  MediaAdapter   │  ← validation, naming, classification
//! ├─────────────────┤
//! │   BlobStore     │  ← memory or filesystem
//! └─────────────────┘
//! ```
//!
//! ```rust
//! use bytes::Bytes;
//! use ink_media::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> MediaResult<()> {
//! let adapter = MediaAdapter::new(MemoryBlobStore::new(), MediaConfig::default());
//! let stored = adapter
//!     .store_upload(
//!         "1",
//!         MediaUpload {
//!             original_filename: "notes.pdf".into(),
//!             content_type: Some("application/pdf".into()),
//!             data: Bytes::from_static(b"%PDF-1.4"),
//!         },
//!     )
//!     .await?;
//! assert!(stored.storage_key.starts_with("1/"));
//! # Ok(())
//! # }
//! ```

pub mod adapter;
mod config;
mod error;
pub mod filename;
pub mod kind;
pub mod store;

pub use adapter::{image_dimensions, MediaAdapter, MediaUpload, StoredMedia};
pub use config::{MediaConfig, DEFAULT_EXTENSIONS};
pub use error::{MediaError, MediaResult};
pub use filename::{extension_of, secure_filename, stored_filename};
pub use kind::{format_file_size, FileKind};
pub use store::{
    BlobKeyStrategy, BlobStore, DefaultKeyStrategy, FsBlobStore, GetResult, MemoryBlobStore, PutResult,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BlobStore, FileKind, MediaAdapter, MediaConfig, MediaError, MediaResult, MediaUpload,
        MemoryBlobStore, StoredMedia,
    };
}
