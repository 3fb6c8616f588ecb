// Authentication options and configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Secret used when none is configured. Refused in production.
pub const DEV_SECRET: &str = "dev-secret-key-change-in-production";

/// Main authentication configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthOptions {
    pub jwt: JwtOptions,
    pub password: PasswordOptions,
    /// How long a password reset token stays valid
    #[serde(with = "humantime_serde")]
    pub reset_token_ttl: Duration,
    /// Emails that are granted super admin on login
    pub super_admins: Vec<String>,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            jwt: JwtOptions::default(),
            password: PasswordOptions::default(),
            reset_token_ttl: Duration::from_secs(3600),
            super_admins: Vec::new(),
        }
    }
}

impl AuthOptions {
    /// Validate the entire authentication configuration
    pub fn validate(&self) -> Result<(), AuthError> {
        self.jwt.validate()?;
        self.password.validate()?;
        if self.reset_token_ttl.is_zero() {
            return Err(AuthError::Config("Reset token TTL must be greater than 0".into()));
        }
        Ok(())
    }

    /// Like [`AuthOptions::validate`], and also refuses the development secret.
    pub fn validate_for_production(&self) -> Result<(), AuthError> {
        self.validate()?;
        if self.jwt.secret == DEV_SECRET {
            return Err(AuthError::Config(
                "SECRET_KEY must be set in production".into(),
            ));
        }
        Ok(())
    }

    pub fn is_super_admin_email(&self, email: &str) -> bool {
        self.super_admins
            .iter()
            .any(|e| e.trim().eq_ignore_ascii_case(email.trim()))
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.jwt.secret = secret.into();
        self
    }

    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.password.bcrypt_cost = cost;
        self
    }

    pub fn with_super_admins<I, S>(mut self, emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.super_admins = emails.into_iter().map(Into::into).collect();
        self
    }
}

/// JWT-specific configuration options
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct JwtOptions {
    /// Token issuer (iss claim)
    pub issuer: String,
    /// Token audience (aud claim)
    pub audience: String,
    /// Access token expiration duration
    #[serde(with = "humantime_serde")]
    pub access_token_expires_in: Duration,
    /// HMAC signing secret
    pub secret: String,
}

impl Default for JwtOptions {
    fn default() -> Self {
        Self {
            issuer: "inkwell".to_string(),
            audience: "inkwell-api".to_string(),
            access_token_expires_in: Duration::from_secs(7 * 24 * 3600),
            secret: DEV_SECRET.to_string(),
        }
    }
}

impl JwtOptions {
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.issuer.is_empty() {
            return Err(AuthError::Config("JWT issuer cannot be empty".into()));
        }
        if self.audience.is_empty() {
            return Err(AuthError::Config("JWT audience cannot be empty".into()));
        }
        if self.secret.is_empty() {
            return Err(AuthError::Config("JWT secret cannot be empty".into()));
        }
        if self.access_token_expires_in.as_secs() == 0 {
            return Err(AuthError::Config(
                "Access token expiration must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PasswordOptions {
    pub bcrypt_cost: u32,
    pub min_length: usize,
}

impl Default for PasswordOptions {
    fn default() -> Self {
        Self {
            bcrypt_cost: 12,
            min_length: 6,
        }
    }
}

impl PasswordOptions {
    pub fn validate(&self) -> Result<(), AuthError> {
        // bcrypt accepts costs 4..=31
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(AuthError::Config(format!(
                "bcrypt cost must be between 4 and 31, got {}",
                self.bcrypt_cost
            )));
        }
        Ok(())
    }
}
