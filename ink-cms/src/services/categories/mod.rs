pub mod categories_schema;
pub mod categories_service;
pub mod categories_shared;

pub use categories_service::CategoriesService;
