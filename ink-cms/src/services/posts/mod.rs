pub mod posts_hooks;
pub mod posts_schema;
pub mod posts_service;
pub mod posts_shared;

pub use posts_service::PostsService;
