use std::collections::HashMap;

use anyhow::Result;
use ink_auth::{AuthError, AuthenticateHookParams, Principal};
use ink_axum::{FromRestParams, RestParams};

/// Params every CMS service receives.
///
/// REST calls arrive with `provider = Some("rest")` and get their principal
/// from the bearer token. Calls made by the CMS itself either carry the
/// principal of the user they act for, or none at all for system work.
#[derive(Debug, Clone, Default)]
pub struct CmsParams {
    pub provider: Option<String>,
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub method: String,
    pub path: String,
    pub principal: Option<Principal>,
}

/// Who a service call acts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller<'a> {
    /// Internal work: bootstrap, cascades, route handlers reading public data.
    System,
    User(&'a Principal),
}

impl Caller<'_> {
    pub fn is_admin(&self) -> bool {
        match self {
            Caller::System => true,
            Caller::User(p) => p.is_admin(),
        }
    }

    pub fn user_id(&self) -> Option<u64> {
        match self {
            Caller::System => None,
            Caller::User(p) => Some(p.user_id),
        }
    }

    pub fn require_admin(&self) -> Result<()> {
        match self {
            Caller::System => Ok(()),
            Caller::User(p) => p.require_admin().map_err(AuthError::into_anyhow),
        }
    }

    pub fn require_super_admin(&self) -> Result<()> {
        match self {
            Caller::System => Ok(()),
            Caller::User(p) => p.require_super_admin().map_err(AuthError::into_anyhow),
        }
    }
}

impl CmsParams {
    /// An internal call with no user behind it.
    pub fn system() -> Self {
        Self::default()
    }

    /// An internal call on behalf of `principal`.
    pub fn for_user(principal: Principal) -> Self {
        Self {
            principal: Some(principal),
            ..Self::default()
        }
    }

    pub fn with_query<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn is_external(&self) -> bool {
        self.provider.as_deref().is_some_and(|p| !p.is_empty())
    }

    pub fn caller(&self) -> Result<Caller<'_>> {
        match (&self.principal, self.is_external()) {
            (Some(p), _) => Ok(Caller::User(p)),
            (None, false) => Ok(Caller::System),
            (None, true) => Err(AuthError::MissingToken.into_anyhow()),
        }
    }

    /// Trimmed, non-empty query value.
    pub fn query_str(&self, key: &str) -> Option<&str> {
        self.query
            .get(key)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    pub fn query_usize(&self, key: &str) -> Option<usize> {
        self.query_str(key).and_then(|v| v.parse().ok())
    }

    pub fn query_bool(&self, key: &str) -> Option<bool> {
        self.query_str(key).and_then(ink_core::config::parse_flag)
    }
}

impl FromRestParams for CmsParams {
    fn from_rest_params(params: RestParams) -> Self {
        Self {
            provider: Some(params.provider),
            headers: params.headers,
            query: params.query,
            method: params.method,
            path: params.path,
            principal: None,
        }
    }
}

impl AuthenticateHookParams for CmsParams {
    fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    fn set_principal(&mut self, principal: Principal) {
        self.principal = Some(principal);
    }
}

#[cfg(test)]
mod tests {
    use ink_auth::Role;

    use super::*;

    #[test]
    fn external_calls_need_a_principal() {
        let rest = CmsParams {
            provider: Some("rest".into()),
            ..CmsParams::default()
        };
        assert!(rest.caller().is_err());
        assert_eq!(CmsParams::system().caller().unwrap(), Caller::System);

        let editor = Principal::new(3, "1", Role::Editor);
        let params = CmsParams::for_user(editor.clone());
        let caller = params.caller().unwrap();
        assert_eq!(caller.user_id(), Some(3));
        assert!(!caller.is_admin());
        assert!(caller.require_admin().is_err());
    }

    #[test]
    fn query_helpers_trim() {
        let p = CmsParams::system().with_query("page", " 2 ").with_query("q", "  ");
        assert_eq!(p.query_usize("page"), Some(2));
        assert_eq!(p.query_str("q"), None);
    }
}
