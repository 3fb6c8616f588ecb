use std::collections::{HashMap, HashSet};

use axum::extract::{FromRequest, Request};
use axum::http::header::CONTENT_TYPE;
use bytes::Bytes;
use ink_core::errors::InkError;

use crate::InkAxumError;

/// Limits applied while reading `multipart/form-data` bodies.
///
/// Insert it as a request extension (`Extension(config)`) to override the
/// defaults for a router.
#[derive(Debug, Clone)]
pub struct MultipartConfig {
    /// Maximum size of a single file in bytes (None = unlimited)
    pub max_file_size: Option<usize>,
    /// Maximum size of the whole body in bytes
    pub max_total_size: usize,
    /// Allowed content types for files (empty = all allowed)
    pub allowed_content_types: HashSet<String>,
    /// Field names treated as files even without a filename
    pub file_fields: HashSet<String>,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            max_file_size: Some(16 * 1024 * 1024),
            max_total_size: 64 * 1024 * 1024,
            allowed_content_types: HashSet::new(),
            file_fields: HashSet::new(),
        }
    }
}

impl MultipartConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_file_size(mut self, size: usize) -> Self {
        self.max_file_size = Some(size);
        self
    }

    pub fn max_total_size(mut self, size: usize) -> Self {
        self.max_total_size = size;
        self
    }

    pub fn allow_content_type(mut self, content_type: &str) -> Self {
        self.allowed_content_types.insert(content_type.to_string());
        self
    }

    pub fn file_field(mut self, field_name: &str) -> Self {
        self.file_fields.insert(field_name.to_string());
        self
    }
}

/// A file part of a multipart body, fully buffered.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    /// As sent by the client; may be empty.
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Parsed `multipart/form-data` body.
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    pub files: Vec<UploadedFile>,
    pub fields: HashMap<String, String>,
}

impl MultipartForm {
    /// Files sent under `field`, in body order.
    pub fn files_named<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a UploadedFile> + 'a {
        self.files.iter().filter(move |f| f.field == field)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|s| s.as_str())
    }
}

fn multipart_error(e: multer::Error) -> InkError {
    match e {
        multer::Error::FieldSizeExceeded { .. } | multer::Error::StreamSizeExceeded { .. } => {
            InkError::payload_too_large("Request body too large")
        }
        other => InkError::bad_request(format!("Failed to parse multipart data: {other}")),
    }
}

pub async fn read_multipart(req: Request, config: &MultipartConfig) -> Result<MultipartForm, InkError> {
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if !content_type.starts_with("multipart/form-data") {
        return Err(InkError::unsupported_media_type("Expected multipart/form-data"));
    }

    let boundary = multer::parse_boundary(&content_type)
        .map_err(|_| InkError::bad_request("Missing boundary in multipart content-type"))?;

    let body = axum::body::to_bytes(req.into_body(), config.max_total_size)
        .await
        .map_err(|_| InkError::payload_too_large("Request body too large"))?;

    let stream = futures::stream::once(async move { Ok::<Bytes, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut form = MultipartForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);
        let part_type = field.content_type().map(|m| m.to_string());

        let is_file = filename.is_some() || config.file_fields.contains(&name);
        if !is_file {
            let value = field.text().await.map_err(multipart_error)?;
            form.fields.insert(name, value);
            continue;
        }

        let data = field.bytes().await.map_err(multipart_error)?;

        if let Some(max) = config.max_file_size {
            if data.len() > max {
                return Err(InkError::payload_too_large(format!(
                    "File exceeds maximum size of {max} bytes"
                )));
            }
        }

        if !config.allowed_content_types.is_empty() {
            if let Some(ct) = &part_type {
                if !config.allowed_content_types.contains(ct) {
                    return Err(InkError::unsupported_media_type(format!(
                        "Content type '{ct}' not allowed"
                    )));
                }
            }
        }

        tracing::debug!(field = %name, bytes = data.len(), "multipart file received");

        form.files.push(UploadedFile {
            field: name,
            filename: filename.unwrap_or_default(),
            content_type: part_type,
            data,
        });
    }

    Ok(form)
}

impl<S> FromRequest<S> for MultipartForm
where
    S: Send + Sync,
{
    type Rejection = InkAxumError;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let config = req
            .extensions()
            .get::<MultipartConfig>()
            .cloned()
            .unwrap_or_default();

        read_multipart(req, &config).await.map_err(InkAxumError::from)
    }
}
