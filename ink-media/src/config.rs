use std::collections::BTreeSet;

/// Default upload allow-list.
pub const DEFAULT_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "pdf", "doc", "docx", "mp4", "mov"];

/// Rules applied to every upload
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Max size of a single file in bytes
    pub max_file_bytes: u64,

    /// Lowercase extensions without the dot
    pub allowed_extensions: BTreeSet<String>,

    /// Public URL prefix blobs are served under
    pub url_prefix: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 16 * 1024 * 1024, // 16MB
            allowed_extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            url_prefix: "/uploads".to_string(),
        }
    }
}

impl MediaConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_file_bytes(mut self, bytes: u64) -> Self {
        self.max_file_bytes = bytes;
        self
    }

    /// Replace the allow-list. Entries are trimmed, lowercased and may
    /// carry a leading dot.
    pub fn with_allowed_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    pub fn with_url_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.url_prefix = prefix.into().trim_end_matches('/').to_string();
        self
    }

    pub fn allows_extension(&self, ext: &str) -> bool {
        self.allowed_extensions.contains(&ext.to_ascii_lowercase())
    }

    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.url_prefix, key)
    }
}
