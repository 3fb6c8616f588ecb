use ink_core::errors::InkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Not authenticated")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token was issued for another site")]
    WrongTenant,

    #[error("Invalid username/email or password.")]
    InvalidCredentials,

    #[error("Password must be at least {0} characters long")]
    WeakPassword(usize),

    #[error("Invalid or expired reset token")]
    InvalidResetToken,

    #[error("{0}")]
    Forbidden(String),

    #[error("Auth configuration error: {0}")]
    Config(String),

    #[error("Password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

impl AuthError {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    /// Wrap as an [`InkError`] so the transport picks the right status.
    pub fn into_anyhow(self) -> anyhow::Error {
        InkError::from(self).into_anyhow()
    }
}

impl From<AuthError> for InkError {
    fn from(err: AuthError) -> Self {
        let msg = err.to_string();
        match err {
            AuthError::MissingToken
            | AuthError::InvalidToken(_)
            | AuthError::WrongTenant
            | AuthError::InvalidCredentials => InkError::not_authenticated(msg),
            AuthError::WeakPassword(_) | AuthError::InvalidResetToken => InkError::bad_request(msg),
            AuthError::Forbidden(_) => InkError::forbidden(msg),
            AuthError::Config(_) | AuthError::Hash(_) => {
                InkError::general_error(msg).with_source(anyhow::Error::new(err))
            }
        }
    }
}

