pub mod tags_schema;
pub mod tags_service;
pub mod tags_shared;

pub use tags_service::TagsService;
