use chrono::{DateTime, Utc};
use ink_core::TenantId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::ts;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub tenant_id: TenantId,
    pub parent_id: Option<u64>,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    /// Hex color used by themes.
    pub color: String,
    pub sort_order: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub fn url(&self) -> String {
        format!("/category/{}", self.slug)
    }

    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "parent_id": self.parent_id,
            "name": self.name,
            "slug": self.slug,
            "description": self.description,
            "color": self.color,
            "sort_order": self.sort_order,
            "is_active": self.is_active,
            "url": self.url(),
            "created_at": ts(&self.created_at),
            "updated_at": ts(&self.updated_at),
        })
    }
}
