use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

use crate::models::SettingType;
use crate::validate::not_blank;

pub const ERROR_MESSAGE: &str = "Settings schema validation failed";

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateSetting {
    #[validate(length(max = 100), custom(function = "not_blank"))]
    pub key: String,
    #[serde(default)]
    pub value: Value,
    /// Overrides the type inferred from `value`.
    pub data_type: Option<SettingType>,
    #[validate(length(max = 255))]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

/// Body of `PATCH`/`PUT /api/settings/{key}`.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PatchSetting {
    pub value: Option<Value>,
    pub data_type: Option<SettingType>,
    #[validate(length(max = 255))]
    pub description: Option<String>,
    pub is_public: Option<bool>,
}
