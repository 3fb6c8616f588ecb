pub mod users_hooks;
pub mod users_schema;
pub mod users_service;
pub mod users_shared;

pub use users_service::UsersService;
