pub mod comments_schema;
pub mod comments_service;
pub mod comments_shared;

pub use comments_service::CommentsService;
