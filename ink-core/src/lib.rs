//! ink-core: framework-agnostic core for Inkwell.
//!
//! Services implement [`InkService`] and always receive the
//! [`TenantContext`] they run for. [`InkApp`] wires them to hooks and
//! configuration; transports (see `ink-axum`) decide how a request maps
//! to a tenant and a service call.

pub mod app;
pub mod config;
pub mod errors;
pub mod hooks;
pub mod registry;
pub mod service;
pub mod tenant;

pub use app::{InkApp, ServiceCaller, ServiceHandle};
pub use config::{ConfigSnapshot, InkConfig};
pub use errors::{ErrorKind, InkError, InkResult};
pub use hooks::{
    HookContext, HookFut, HookResult, InkAfterHook, InkAroundHook, InkBeforeHook, InkErrorHook,
    Next, ServiceHooks,
};
pub use registry::ServiceRegistry;
pub use service::{InkService, ServiceCapabilities, ServiceMethodKind};
pub use tenant::{TenantContext, TenantId};
