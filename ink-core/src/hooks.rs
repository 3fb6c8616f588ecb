//! Hook pipeline types.
//!
//! Every service call runs as:
//!
//! ```text
//! around (outermost first)
//!   └─ before hooks → service method → after hooks (reverse order)
//! error hooks (only when something above failed)
//! ```
//!
//! App-wide hooks registered with `app.hooks(..)` always run before the
//! hooks registered on a single service.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::app::ServiceCaller;
use crate::config::ConfigSnapshot;
use crate::service::ServiceMethodKind;
use crate::tenant::TenantContext;

pub type HookFut<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Output of a service call as seen by after hooks.
#[derive(Debug, Clone)]
pub enum HookResult<R> {
    One(R),
    Many(Vec<R>),
}

impl<R> HookResult<R> {
    /// Apply `f` to every record.
    pub fn map<F>(self, mut f: F) -> Self
    where
        F: FnMut(R) -> R,
    {
        match self {
            HookResult::One(v) => HookResult::One(f(v)),
            HookResult::Many(vs) => HookResult::Many(vs.into_iter().map(f).collect()),
        }
    }
}

/// Context passed to hooks.
pub struct HookContext<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub tenant: TenantContext,
    pub service: String,
    pub method: ServiceMethodKind,
    pub id: Option<String>,
    pub params: P,
    /// Input payload for create/update/patch.
    pub data: Option<R>,
    pub result: Option<HookResult<R>>,
    pub error: Option<anyhow::Error>,
    pub services: ServiceCaller<R, P>,
    pub config: ConfigSnapshot,
}

impl<R, P> HookContext<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub fn new(
        tenant: TenantContext,
        service: impl Into<String>,
        method: ServiceMethodKind,
        params: P,
        services: ServiceCaller<R, P>,
        config: ConfigSnapshot,
    ) -> Self {
        Self {
            tenant,
            service: service.into(),
            method,
            id: None,
            params,
            data: None,
            result: None,
            error: None,
            services,
            config,
        }
    }
}

#[async_trait]
pub trait InkBeforeHook<R, P>: Send + Sync
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    async fn run(&self, ctx: &mut HookContext<R, P>) -> Result<()>;
}

#[async_trait]
pub trait InkAfterHook<R, P>: Send + Sync
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    async fn run(&self, ctx: &mut HookContext<R, P>) -> Result<()>;
}

/// Runs with `ctx.error` set. Clearing `ctx.error` recovers the call.
#[async_trait]
pub trait InkErrorHook<R, P>: Send + Sync
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    async fn run(&self, ctx: &mut HookContext<R, P>) -> Result<()>;
}

#[async_trait]
pub trait InkAroundHook<R, P>: Send + Sync
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    async fn run(&self, ctx: &mut HookContext<R, P>, next: Next<R, P>) -> Result<()>;
}

type NextFn<R, P> =
    Box<dyn for<'a> FnOnce(&'a mut HookContext<R, P>) -> HookFut<'a> + Send>;

/// The rest of the pipeline, handed to around hooks.
pub struct Next<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    call: NextFn<R, P>,
}

impl<R, P> Next<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub fn new<F>(f: F) -> Self
    where
        F: for<'a> FnOnce(&'a mut HookContext<R, P>) -> HookFut<'a> + Send + 'static,
    {
        Self { call: Box::new(f) }
    }

    pub async fn run(self, ctx: &mut HookContext<R, P>) -> Result<()> {
        (self.call)(ctx).await
    }
}

type HookMap<H> = HashMap<ServiceMethodKind, Vec<Arc<H>>>;

/// Hooks registered at one level (app-wide or a single service).
pub struct ServiceHooks<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub around_all: Vec<Arc<dyn InkAroundHook<R, P>>>,
    pub before_all: Vec<Arc<dyn InkBeforeHook<R, P>>>,
    pub after_all: Vec<Arc<dyn InkAfterHook<R, P>>>,
    pub error_all: Vec<Arc<dyn InkErrorHook<R, P>>>,

    pub around_by_method: HookMap<dyn InkAroundHook<R, P>>,
    pub before_by_method: HookMap<dyn InkBeforeHook<R, P>>,
    pub after_by_method: HookMap<dyn InkAfterHook<R, P>>,
    pub error_by_method: HookMap<dyn InkErrorHook<R, P>>,
}

impl<R, P> Default for ServiceHooks<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R, P> ServiceHooks<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub fn new() -> Self {
        Self {
            around_all: Vec::new(),
            before_all: Vec::new(),
            after_all: Vec::new(),
            error_all: Vec::new(),
            around_by_method: HashMap::new(),
            before_by_method: HashMap::new(),
            after_by_method: HashMap::new(),
            error_by_method: HashMap::new(),
        }
    }

    pub fn around_all(&mut self, hook: Arc<dyn InkAroundHook<R, P>>) -> &mut Self {
        self.around_all.push(hook);
        self
    }

    pub fn before_all(&mut self, hook: Arc<dyn InkBeforeHook<R, P>>) -> &mut Self {
        self.before_all.push(hook);
        self
    }

    pub fn after_all(&mut self, hook: Arc<dyn InkAfterHook<R, P>>) -> &mut Self {
        self.after_all.push(hook);
        self
    }

    pub fn error_all(&mut self, hook: Arc<dyn InkErrorHook<R, P>>) -> &mut Self {
        self.error_all.push(hook);
        self
    }

    pub fn around(
        &mut self,
        method: ServiceMethodKind,
        hook: Arc<dyn InkAroundHook<R, P>>,
    ) -> &mut Self {
        self.around_by_method.entry(method).or_default().push(hook);
        self
    }

    pub fn before(
        &mut self,
        method: ServiceMethodKind,
        hook: Arc<dyn InkBeforeHook<R, P>>,
    ) -> &mut Self {
        self.before_by_method.entry(method).or_default().push(hook);
        self
    }

    pub fn after(&mut self, method: ServiceMethodKind, hook: Arc<dyn InkAfterHook<R, P>>) -> &mut Self {
        self.after_by_method.entry(method).or_default().push(hook);
        self
    }

    pub fn error(&mut self, method: ServiceMethodKind, hook: Arc<dyn InkErrorHook<R, P>>) -> &mut Self {
        self.error_by_method.entry(method).or_default().push(hook);
        self
    }

    pub fn before_create(&mut self, hook: Arc<dyn InkBeforeHook<R, P>>) -> &mut Self {
        self.before(ServiceMethodKind::Create, hook)
    }

    pub fn before_update(&mut self, hook: Arc<dyn InkBeforeHook<R, P>>) -> &mut Self {
        self.before(ServiceMethodKind::Update, hook)
    }

    pub fn before_patch(&mut self, hook: Arc<dyn InkBeforeHook<R, P>>) -> &mut Self {
        self.before(ServiceMethodKind::Patch, hook)
    }

    pub fn before_remove(&mut self, hook: Arc<dyn InkBeforeHook<R, P>>) -> &mut Self {
        self.before(ServiceMethodKind::Remove, hook)
    }

    pub fn after_find(&mut self, hook: Arc<dyn InkAfterHook<R, P>>) -> &mut Self {
        self.after(ServiceMethodKind::Find, hook)
    }

    pub fn after_get(&mut self, hook: Arc<dyn InkAfterHook<R, P>>) -> &mut Self {
        self.after(ServiceMethodKind::Get, hook)
    }

    pub fn after_create(&mut self, hook: Arc<dyn InkAfterHook<R, P>>) -> &mut Self {
        self.after(ServiceMethodKind::Create, hook)
    }
}

/// Hooks registered for every method, followed by those for `method`.
pub fn collect_method_hooks<H: ?Sized>(
    all: &[Arc<H>],
    by_method: &HookMap<H>,
    method: &ServiceMethodKind,
) -> Vec<Arc<H>> {
    let mut out: Vec<Arc<H>> = all.to_vec();
    if let Some(specific) = by_method.get(method) {
        out.extend(specific.iter().cloned());
    }
    out
}
