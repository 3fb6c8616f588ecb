use serde::Deserialize;
use validator::Validate;

pub const ERROR_MESSAGE: &str = "Media schema validation failed";

/// Only the descriptive fields of a media file can change.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PatchMedia {
    #[validate(length(max = 255))]
    pub title: Option<String>,
    #[validate(length(max = 255))]
    pub alt_text: Option<String>,
    pub description: Option<String>,
}
