pub mod media_schema;
pub mod media_service;
pub mod media_shared;

pub use media_service::MediaService;
