use chrono::{DateTime, Utc};
use ink_core::TenantId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::ts;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: u64,
    pub tenant_id: TenantId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub color: String,
    /// Number of posts carrying the tag.
    pub use_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tag {
    pub fn url(&self) -> String {
        format!("/tag/{}", self.slug)
    }

    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "slug": self.slug,
            "description": self.description,
            "color": self.color,
            "use_count": self.use_count,
            "url": self.url(),
            "created_at": ts(&self.created_at),
            "updated_at": ts(&self.updated_at),
        })
    }
}
