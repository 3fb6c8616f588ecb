use serde::Deserialize;
use validator::Validate;

use crate::store::TenantChanges;
use crate::validate::{double_option, not_blank};

pub const ERROR_MESSAGE: &str = "Tenants schema validation failed";

/// A new site together with its first admin account.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateTenant {
    #[validate(length(max = 100), custom(function = "not_blank"))]
    pub name: String,
    #[validate(length(max = 50), custom(function = "not_blank"))]
    pub subdomain: String,
    #[validate(length(max = 100))]
    pub custom_domain: Option<String>,
    #[validate(length(max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(length(max = 50))]
    pub theme: Option<String>,

    #[serde(default)]
    pub admin_email: String,
    #[serde(default)]
    pub admin_username: String,
    #[serde(default)]
    pub admin_password: String,
    pub admin_first_name: Option<String>,
    pub admin_last_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PatchTenant {
    #[validate(length(max = 100), custom(function = "not_blank"))]
    pub name: Option<String>,
    #[validate(length(max = 200))]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[validate(length(max = 50))]
    pub theme: Option<String>,
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub custom_domain: Option<Option<String>>,
}

impl From<PatchTenant> for TenantChanges {
    fn from(p: PatchTenant) -> Self {
        TenantChanges {
            name: p.name,
            title: p.title.map(|t| t.trim().to_string()),
            description: p.description,
            theme: p.theme,
            is_active: p.is_active,
            custom_domain: p.custom_domain,
        }
    }
}
