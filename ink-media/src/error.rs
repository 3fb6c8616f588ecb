use ink_core::errors::InkError;
use thiserror::Error;

/// Result type for media operations
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while handling uploads and blobs
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("No file provided")]
    NoFile,

    #[error("No file selected")]
    NoFilename,

    #[error("File type not allowed")]
    TypeNotAllowed { extension: Option<String> },

    #[error("File exceeds maximum size of {max} bytes")]
    TooLarge { size: u64, max: u64 },

    #[error("Blob not found: {key}")]
    NotFound { key: String },

    #[error("Invalid request: {message}")]
    Invalid { message: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl MediaError {
    pub fn not_found<S: Into<String>>(key: S) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    pub fn into_anyhow(self) -> anyhow::Error {
        InkError::from(self).into_anyhow()
    }
}

impl From<MediaError> for InkError {
    fn from(err: MediaError) -> Self {
        let msg = err.to_string();
        match err {
            MediaError::NoFile | MediaError::NoFilename | MediaError::Invalid { .. } => {
                InkError::bad_request(msg)
            }
            MediaError::TypeNotAllowed { .. } => InkError::unsupported_media_type(msg),
            MediaError::TooLarge { .. } => InkError::payload_too_large(msg),
            MediaError::NotFound { .. } => InkError::not_found(msg),
            MediaError::Io { .. } => InkError::general_error(msg).with_source(anyhow::Error::new(err)),
        }
    }
}
