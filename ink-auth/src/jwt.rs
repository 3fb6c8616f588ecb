// Tenant-bound access tokens.

use std::collections::HashMap;

use chrono::Utc;
use ink_core::tenant::{TenantContext, TenantId};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;
use crate::options::JwtOptions;
use crate::role::{Principal, Role};

/// Claims of an Inkwell access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// User id
    pub sub: String,
    /// Tenant the token was minted on
    pub tenant: String,
    pub role: Role,
    /// Super admin
    #[serde(default)]
    pub sa: bool,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl Claims {
    pub fn principal(&self) -> Result<Principal, AuthError> {
        let user_id = self
            .sub
            .parse::<u64>()
            .map_err(|_| AuthError::InvalidToken("bad subject".into()))?;
        Ok(Principal {
            user_id,
            tenant_id: TenantId::from(self.tenant.as_str()),
            role: self.role,
            is_super_admin: self.sa,
        })
    }
}

/// Signs and verifies HS256 access tokens.
#[derive(Clone)]
pub struct TokenService {
    options: JwtOptions,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.options.issuer)
            .field("audience", &self.options.audience)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(options: JwtOptions) -> Result<Self, AuthError> {
        options.validate()?;
        let encoding = EncodingKey::from_secret(options.secret.as_bytes());
        let decoding = DecodingKey::from_secret(options.secret.as_bytes());
        Ok(Self {
            options,
            encoding,
            decoding,
        })
    }

    pub fn options(&self) -> &JwtOptions {
        &self.options
    }

    pub fn issue(&self, principal: &Principal) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(self.options.access_token_expires_in.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: principal.user_id.to_string(),
            tenant: principal.tenant_id.to_string(),
            role: principal.role,
            sa: principal.is_super_admin,
            iss: self.options.issuer.clone(),
            aud: self.options.audience.clone(),
            iat: now,
            exp: now.saturating_add(ttl),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.options.issuer.as_str()]);
        validation.set_audience(&[self.options.audience.as_str()]);

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    /// Verify `token` and check it may act on `tenant`.
    ///
    /// Super admins may act on any tenant; everyone else only on the tenant
    /// the token was minted on.
    pub fn authenticate(&self, tenant: &TenantContext, token: &str) -> Result<Principal, AuthError> {
        let principal = self.verify(token)?.principal()?;
        if !principal.is_super_admin && !tenant.owns(&principal.tenant_id) {
            tracing::debug!(
                token_tenant = %principal.tenant_id,
                tenant = %tenant.tenant_id,
                "token presented on another tenant"
            );
            return Err(AuthError::WrongTenant);
        }
        Ok(principal)
    }
}

/// `Authorization: Bearer <token>` (or `JWT <token>`) from lowercase headers.
pub fn extract_bearer_token(headers: &HashMap<String, String>) -> Option<String> {
    bearer_from_value(headers.get("authorization")?)
}

pub fn bearer_from_value(value: &str) -> Option<String> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    let allowed = ["Bearer", "JWT"].iter().any(|s| s.eq_ignore_ascii_case(scheme.trim()));
    if !allowed || token.is_empty() {
        return None;
    }
    Some(token.to_string())
}
