// Authentication core.

use std::collections::HashMap;

use ink_core::tenant::TenantContext;

use crate::error::AuthError;
use crate::jwt::{extract_bearer_token, TokenService};
use crate::options::AuthOptions;
use crate::password::PasswordHasher;
use crate::reset::{issue_reset_token, ResetToken};
use crate::role::Principal;

/// Everything needed to log users in and recognise them again.
#[derive(Debug, Clone)]
pub struct Authenticator {
    options: AuthOptions,
    tokens: TokenService,
    passwords: PasswordHasher,
}

impl Authenticator {
    pub fn new(options: AuthOptions) -> Result<Self, AuthError> {
        options.validate()?;
        Ok(Self {
            tokens: TokenService::new(options.jwt.clone())?,
            passwords: PasswordHasher::new(options.password.clone()),
            options,
        })
    }

    pub fn options(&self) -> &AuthOptions {
        &self.options
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn passwords(&self) -> &PasswordHasher {
        &self.passwords
    }

    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        self.passwords.hash(password)
    }

    pub fn verify_password(&self, password: &str, password_hash: &str) -> bool {
        self.passwords.verify(password, password_hash)
    }

    pub fn issue_token(&self, principal: &Principal) -> Result<String, AuthError> {
        self.tokens.issue(principal)
    }

    pub fn issue_reset_token(&self) -> ResetToken {
        issue_reset_token(self.options.reset_token_ttl)
    }

    /// Principal of the bearer token in `headers`, checked against `tenant`.
    pub fn authenticate(
        &self,
        tenant: &TenantContext,
        headers: &HashMap<String, String>,
    ) -> Result<Principal, AuthError> {
        let token = extract_bearer_token(headers).ok_or(AuthError::MissingToken)?;
        self.tokens.authenticate(tenant, &token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::Role;

    fn auth() -> Authenticator {
        Authenticator::new(AuthOptions::default().with_secret("k").with_bcrypt_cost(4)).unwrap()
    }

    #[test]
    fn authenticate_reads_the_authorization_header() {
        let auth = auth();
        let token = auth.issue_token(&Principal::new(3, "1", Role::Editor)).unwrap();

        let mut headers = HashMap::new();
        assert!(matches!(
            auth.authenticate(&TenantContext::new("1"), &headers),
            Err(AuthError::MissingToken)
        ));

        headers.insert("authorization".to_string(), format!("Bearer {token}"));
        let p = auth.authenticate(&TenantContext::new("1"), &headers).unwrap();
        assert_eq!(p.user_id, 3);
        assert!(auth.authenticate(&TenantContext::new("9"), &headers).is_err());
    }

    #[test]
    fn invalid_options_are_refused() {
        let mut opts = AuthOptions::default();
        opts.jwt.secret.clear();
        assert!(Authenticator::new(opts).is_err());
    }
}
