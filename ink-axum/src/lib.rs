//! ink-axum: Axum adapter for Inkwell.
//!
//! Builds axum routers from Inkwell services, resolves the tenant of each
//! request from its host and turns structured errors into JSON responses.

pub mod app;
mod error;
pub mod multipart;
pub mod params;
pub mod rest;
pub mod state;
pub mod tenancy;

pub use app::{axum, AxumApp};
pub use error::InkAxumError;
pub use multipart::{MultipartConfig, MultipartForm, UploadedFile};
pub use params::{FromRestParams, RestParams};
pub use state::InkAxumState;
pub use tenancy::{HostMatch, HostRules, Tenancy, Tenant, TenantResolver};
