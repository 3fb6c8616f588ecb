//! Core multi-tenant types for Inkwell.

use std::fmt;

/// Identifier of a tenant (one blog/site).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TenantId(pub String);

impl TenantId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TenantId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Context carried with every Inkwell operation.
///
/// Transports resolve it once per request and hand it to services and
/// hooks explicitly; nothing in the framework keeps an ambient "current
/// tenant".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: TenantId,
    /// Subdomain the tenant was addressed by, when known.
    pub subdomain: Option<String>,
}

impl TenantContext {
    /// Convenience constructor from a string.
    pub fn new<S: Into<String>>(tenant: S) -> Self {
        Self {
            tenant_id: TenantId(tenant.into()),
            subdomain: None,
        }
    }

    pub fn with_subdomain(mut self, subdomain: impl Into<String>) -> Self {
        self.subdomain = Some(subdomain.into());
        self
    }

    /// True when `other` names the same tenant.
    pub fn owns(&self, other: &TenantId) -> bool {
        &self.tenant_id == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owns_compares_ids_only() {
        let ctx = TenantContext::new("7").with_subdomain("acme");
        assert!(ctx.owns(&TenantId::from("7")));
        assert!(!ctx.owns(&TenantId::from("8")));
        assert_eq!(ctx.tenant_id.to_string(), "7");
    }
}
