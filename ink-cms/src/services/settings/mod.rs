pub mod settings_schema;
pub mod settings_service;
pub mod settings_shared;

pub use settings_service::SettingsService;
