// Password reset tokens.

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use rand::RngCore;

use crate::error::AuthError;

/// A freshly issued reset token and its expiry.
#[derive(Debug, Clone)]
pub struct ResetToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// 32 random bytes, URL-safe base64.
pub fn issue_reset_token(ttl: Duration) -> ResetToken {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(1));
    ResetToken {
        token: URL_SAFE_NO_PAD.encode(bytes),
        expires_at: Utc::now() + ttl,
    }
}

/// Check a presented token against the stored one.
pub fn check_reset_token(
    stored: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
    presented: &str,
    now: DateTime<Utc>,
) -> Result<(), AuthError> {
    let (Some(stored), Some(expires_at)) = (stored, expires_at) else {
        return Err(AuthError::InvalidResetToken);
    };
    if presented.is_empty() || !constant_time_eq(stored.as_bytes(), presented.as_bytes()) {
        return Err(AuthError::InvalidResetToken);
    }
    if now > expires_at {
        return Err(AuthError::InvalidResetToken);
    }
    Ok(())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_url_safe_and_unique() {
        let a = issue_reset_token(Duration::from_secs(3600));
        let b = issue_reset_token(Duration::from_secs(3600));
        assert_ne!(a.token, b.token);
        assert_eq!(a.token.len(), 43);
        assert!(a
            .token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn tokens_expire() {
        let t = issue_reset_token(Duration::from_secs(3600));
        let now = Utc::now();
        assert!(check_reset_token(Some(&t.token), Some(t.expires_at), &t.token, now).is_ok());
        assert!(check_reset_token(
            Some(&t.token),
            Some(t.expires_at),
            &t.token,
            now + chrono::Duration::hours(2)
        )
        .is_err());
    }

    #[test]
    fn wrong_or_missing_tokens_fail() {
        let t = issue_reset_token(Duration::from_secs(60));
        let now = Utc::now();
        assert!(check_reset_token(Some(&t.token), Some(t.expires_at), "nope", now).is_err());
        assert!(check_reset_token(None, None, &t.token, now).is_err());
    }
}
