pub mod authenticate;
pub mod hash_password;
pub mod protect;

pub use authenticate::{AuthenticateHook, AuthenticateHookParams};
pub use hash_password::HashPasswordHook;
pub use protect::ProtectHook;
