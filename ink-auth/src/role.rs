use std::fmt;
use std::str::FromStr;

use ink_core::tenant::TenantId;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Role of a user inside one tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Editor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Editor => "editor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "editor" => Ok(Role::Editor),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: u64,
    pub tenant_id: TenantId,
    pub role: Role,
    pub is_super_admin: bool,
}

impl Principal {
    pub fn new(user_id: u64, tenant_id: impl Into<TenantId>, role: Role) -> Self {
        Self {
            user_id,
            tenant_id: tenant_id.into(),
            role,
            is_super_admin: false,
        }
    }

    pub fn super_admin(mut self, yes: bool) -> Self {
        self.is_super_admin = yes;
        self
    }

    /// Admins of the tenant and super admins.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin || self.is_super_admin
    }

    pub fn is_editor(&self) -> bool {
        self.role == Role::Editor
    }

    pub fn can_edit_post(&self, author_id: u64) -> bool {
        self.is_admin() || self.user_id == author_id
    }

    pub fn can_delete_post(&self, author_id: u64) -> bool {
        self.can_edit_post(author_id)
    }

    pub fn require_admin(&self) -> Result<(), AuthError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AuthError::forbidden("Admin privileges required"))
        }
    }

    pub fn require_super_admin(&self) -> Result<(), AuthError> {
        if self.is_super_admin {
            Ok(())
        } else {
            Err(AuthError::forbidden("Super admin privileges required"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editors_only_touch_their_own_posts() {
        let editor = Principal::new(7, "1", Role::Editor);
        assert!(editor.can_edit_post(7));
        assert!(!editor.can_edit_post(8));
        assert!(!editor.can_delete_post(8));
        assert!(editor.require_admin().is_err());
    }

    #[test]
    fn admins_and_super_admins_touch_everything() {
        let admin = Principal::new(1, "1", Role::Admin);
        assert!(admin.can_edit_post(99));
        assert!(admin.require_super_admin().is_err());

        let root = Principal::new(2, "1", Role::Editor).super_admin(true);
        assert!(root.is_admin());
        assert!(root.can_delete_post(99));
        assert!(root.require_super_admin().is_ok());
    }

    #[test]
    fn roles_parse_and_serialize_lowercase() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("owner".parse::<Role>().is_err());
        assert_eq!(serde_json::to_value(Role::Editor).unwrap(), "editor");
    }
}
