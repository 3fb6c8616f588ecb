use serde::Deserialize;
use validator::Validate;

use crate::validate::{double_option, not_blank};

pub const ERROR_MESSAGE: &str = "Categories schema validation failed";

pub const DEFAULT_COLOR: &str = "#007bff";

/// Body of `create` and `update`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategory {
    #[validate(length(max = 100), custom(function = "not_blank"))]
    pub name: String,
    #[validate(length(max = 100))]
    pub slug: Option<String>,
    pub description: Option<String>,
    #[validate(length(min = 4, max = 7))]
    pub color: Option<String>,
    pub sort_order: Option<i64>,
    pub parent_id: Option<u64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PatchCategory {
    #[validate(length(max = 100), custom(function = "not_blank"))]
    pub name: Option<String>,
    #[validate(length(max = 100))]
    pub slug: Option<String>,
    pub description: Option<String>,
    #[validate(length(min = 4, max = 7))]
    pub color: Option<String>,
    pub sort_order: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<u64>>,
    pub is_active: Option<bool>,
}

/// What a write changes on a category.
#[derive(Debug, Default)]
pub struct CategoryChanges {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<Option<String>>,
    pub color: Option<String>,
    pub sort_order: Option<i64>,
    pub parent_id: Option<Option<u64>>,
    pub is_active: Option<bool>,
}

impl From<CreateCategory> for CategoryChanges {
    fn from(c: CreateCategory) -> Self {
        Self {
            name: Some(c.name),
            slug: c.slug,
            description: Some(c.description),
            color: Some(c.color.unwrap_or_else(|| DEFAULT_COLOR.to_string())),
            sort_order: Some(c.sort_order.unwrap_or(0)),
            parent_id: Some(c.parent_id),
            is_active: Some(c.is_active.unwrap_or(true)),
        }
    }
}

impl From<PatchCategory> for CategoryChanges {
    fn from(c: PatchCategory) -> Self {
        Self {
            name: c.name,
            slug: c.slug,
            description: c.description.map(Some),
            color: c.color,
            sort_order: c.sort_order,
            parent_id: c.parent_id,
            is_active: c.is_active,
        }
    }
}
