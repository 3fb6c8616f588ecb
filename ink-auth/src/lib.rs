//! ink-auth: authentication for Inkwell.
//!
//! Passwords are bcrypt hashed, access tokens are HS256 JWTs bound to the
//! tenant they were minted on, and [`Principal`] carries the role checks
//! used by the CMS.

pub mod core;
pub mod error;
pub mod hooks;
pub mod jwt;
pub mod options;
pub mod password;
pub mod reset;
pub mod role;

pub use crate::core::Authenticator;
pub use error::AuthError;
pub use hooks::{AuthenticateHook, AuthenticateHookParams, HashPasswordHook, ProtectHook};
pub use jwt::{bearer_from_value, extract_bearer_token, Claims, TokenService};
pub use options::{AuthOptions, JwtOptions, PasswordOptions, DEV_SECRET};
pub use password::PasswordHasher;
pub use reset::{check_reset_token, issue_reset_token, ResetToken};
pub use role::{Principal, Role};
