use bcrypt::{hash, verify};

use crate::error::AuthError;
use crate::options::PasswordOptions;

/// bcrypt hashing with a configured cost and minimum length.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    options: PasswordOptions,
}

impl PasswordHasher {
    pub fn new(options: PasswordOptions) -> Self {
        Self { options }
    }

    pub fn check_strength(&self, password: &str) -> Result<(), AuthError> {
        if password.chars().count() < self.options.min_length {
            return Err(AuthError::WeakPassword(self.options.min_length));
        }
        Ok(())
    }

    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        self.check_strength(password)?;
        Ok(hash(password, self.options.bcrypt_cost)?)
    }

    /// False for a wrong password and for a malformed hash alike.
    pub fn verify(&self, password: &str, password_hash: &str) -> bool {
        verify(password, password_hash).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(PasswordOptions {
            bcrypt_cost: 4,
            min_length: 6,
        })
    }

    #[test]
    fn hashes_verify_only_the_right_password() {
        let h = hasher();
        let hashed = h.hash("hunter22").unwrap();
        assert_ne!(hashed, "hunter22");
        assert!(h.verify("hunter22", &hashed));
        assert!(!h.verify("hunter23", &hashed));
        assert!(!h.verify("hunter22", "not-a-hash"));
    }

    #[test]
    fn short_passwords_are_refused() {
        assert!(matches!(hasher().hash("12345"), Err(AuthError::WeakPassword(6))));
        assert!(hasher().check_strength("123456").is_ok());
    }
}
