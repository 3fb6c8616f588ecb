use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use ink_core::TenantId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::ts;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentStatus {
    #[default]
    Pending,
    Approved,
    Spam,
    Trash,
}

impl CommentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentStatus::Pending => "pending",
            CommentStatus::Approved => "approved",
            CommentStatus::Spam => "spam",
            CommentStatus::Trash => "trash",
        }
    }
}

impl fmt::Display for CommentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(CommentStatus::Pending),
            "approved" => Ok(CommentStatus::Approved),
            "spam" => Ok(CommentStatus::Spam),
            "trash" => Ok(CommentStatus::Trash),
            other => Err(format!("unknown comment status '{other}'")),
        }
    }
}

/// A reader comment on a post. Guests leave `user_id` empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub tenant_id: TenantId,
    pub post_id: u64,
    /// The comment this one replies to.
    pub parent_id: Option<u64>,
    pub user_id: Option<u64>,
    pub author_name: String,
    pub author_email: String,
    pub author_website: Option<String>,
    pub author_ip: Option<String>,
    pub content: String,
    pub status: CommentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_guest(&self) -> bool {
        self.user_id.is_none()
    }

    pub fn is_approved(&self) -> bool {
        self.status == CommentStatus::Approved
    }

    pub fn set_status(&mut self, status: CommentStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
    }

    /// Public shape; the author's email and address stay private.
    pub fn to_json(&self, reply_count: usize) -> Value {
        json!({
            "id": self.id,
            "post_id": self.post_id,
            "parent_id": self.parent_id,
            "content": self.content,
            "author_name": self.author_name,
            "author_website": self.author_website,
            "is_guest": self.is_guest(),
            "status": self.status,
            "is_approved": self.is_approved(),
            "reply_count": reply_count,
            "created_at": ts(&self.created_at),
            "updated_at": ts(&self.updated_at),
        })
    }
}
