use serde::Deserialize;
use validator::Validate;

use crate::validate::not_blank;

pub const ERROR_MESSAGE: &str = "Tags schema validation failed";

pub const DEFAULT_COLOR: &str = "#6c757d";

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTag {
    #[validate(length(max = 50), custom(function = "not_blank"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(min = 4, max = 7))]
    pub color: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PatchTag {
    #[validate(length(max = 50), custom(function = "not_blank"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(length(min = 4, max = 7))]
    pub color: Option<String>,
}
