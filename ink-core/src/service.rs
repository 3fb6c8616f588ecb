use anyhow::Result;
use async_trait::async_trait;

use crate::errors::InkError;
use crate::tenant::TenantContext;

/// Standard service methods: find, get, create, update, patch, remove.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServiceMethodKind {
    Find,
    Get,
    Create,
    Update,
    Patch,
    Remove,
}

impl ServiceMethodKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceMethodKind::Find => "find",
            ServiceMethodKind::Get => "get",
            ServiceMethodKind::Create => "create",
            ServiceMethodKind::Update => "update",
            ServiceMethodKind::Patch => "patch",
            ServiceMethodKind::Remove => "remove",
        }
    }
}

/// Which methods a service exposes to transports.
///
/// Adapters (like ink-axum) answer 405 for anything not listed.
#[derive(Debug, Clone)]
pub struct ServiceCapabilities {
    pub allowed_methods: Vec<ServiceMethodKind>,
}

impl ServiceCapabilities {
    pub fn standard_crud() -> Self {
        use ServiceMethodKind::*;
        Self {
            allowed_methods: vec![Find, Get, Create, Update, Patch, Remove],
        }
    }

    pub fn from_methods(methods: Vec<ServiceMethodKind>) -> Self {
        Self {
            allowed_methods: methods,
        }
    }

    pub fn allows(&self, method: &ServiceMethodKind) -> bool {
        self.allowed_methods.contains(method)
    }
}

fn not_implemented(method: &str) -> anyhow::Error {
    InkError::method_not_allowed(format!("Method not implemented: {method}")).into_anyhow()
}

/// Core Inkwell service trait:
///
/// - `find`   → list/query many
/// - `get`    → fetch one by id
/// - `create` → create one
/// - `update` → full replace
/// - `patch`  → partial update
/// - `remove` → delete one
///
/// Every method receives the tenant it runs for. Defaults answer
/// `MethodNotAllowed`, so a service overrides only what it supports.
#[async_trait]
pub trait InkService<R, P = ()>: Send + Sync
where
    R: Send + 'static,
    P: Send + 'static,
{
    fn capabilities(&self) -> ServiceCapabilities {
        ServiceCapabilities::standard_crud()
    }

    async fn find(&self, _ctx: &TenantContext, _params: P) -> Result<Vec<R>> {
        Err(not_implemented("find"))
    }

    async fn get(&self, _ctx: &TenantContext, _id: &str, _params: P) -> Result<R> {
        Err(not_implemented("get"))
    }

    async fn create(&self, _ctx: &TenantContext, _data: R, _params: P) -> Result<R> {
        Err(not_implemented("create"))
    }

    async fn update(&self, _ctx: &TenantContext, _id: &str, _data: R, _params: P) -> Result<R> {
        Err(not_implemented("update"))
    }

    async fn patch(
        &self,
        _ctx: &TenantContext,
        _id: Option<&str>,
        _data: R,
        _params: P,
    ) -> Result<R> {
        Err(not_implemented("patch"))
    }

    async fn remove(&self, _ctx: &TenantContext, _id: Option<&str>, _params: P) -> Result<R> {
        Err(not_implemented("remove"))
    }
}
