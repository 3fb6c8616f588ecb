use chrono::{DateTime, Utc};
use ink_auth::{Principal, Role};
use ink_core::TenantId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{opt_ts, ts};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub tenant_id: TenantId,
    /// Always stored lowercase.
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub is_super_admin: bool,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub website_url: Option<String>,
    pub password_reset_token: Option<String>,
    pub password_reset_expires: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    pub fn principal(&self) -> Principal {
        Principal::new(self.id, self.tenant_id.clone(), self.role).super_admin(self.is_super_admin)
    }

    /// Matches the email or the username, ignoring case.
    pub fn answers_to(&self, login: &str) -> bool {
        let login = login.trim();
        self.email.eq_ignore_ascii_case(login) || self.username.eq_ignore_ascii_case(login)
    }

    /// Public shape; never includes the hash or reset token.
    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "email": self.email,
            "username": self.username,
            "first_name": self.first_name,
            "last_name": self.last_name,
            "full_name": self.full_name(),
            "role": self.role,
            "is_active": self.is_active,
            "is_super_admin": self.is_super_admin,
            "bio": self.bio,
            "avatar_url": self.avatar_url,
            "website_url": self.website_url,
            "last_login": opt_ts(&self.last_login),
            "created_at": ts(&self.created_at),
            "updated_at": ts(&self.updated_at),
        })
    }
}

/// Prefix `https://` when a website has no scheme.
pub fn normalize_website(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        Some(url.to_string())
    } else {
        Some(format!("https://{url}"))
    }
}
