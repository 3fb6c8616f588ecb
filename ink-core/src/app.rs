use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Result;

use crate::errors::InkError;
use crate::hooks::{collect_method_hooks, HookContext, HookResult, Next, ServiceHooks};
use crate::{
    ConfigSnapshot, InkAfterHook, InkAroundHook, InkBeforeHook, InkConfig, InkErrorHook,
    InkService, ServiceMethodKind, ServiceRegistry, TenantContext,
};

// Registry locks are only held for short, synchronous sections; a panic
// elsewhere must not take the whole app down with it.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

struct InkAppInner<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    registry: RwLock<ServiceRegistry<R, P>>,
    global_hooks: RwLock<ServiceHooks<R, P>>,
    service_hooks: RwLock<HashMap<String, ServiceHooks<R, P>>>,
    config: RwLock<InkConfig>,
    // Holds the same Arc<dyn InkService<R, P>> type-erased, so sibling
    // services with other record types can be looked up by name.
    any_services: RwLock<HashMap<String, Box<dyn Any + Send + Sync>>>,
}

/// The central application container.
///
/// Framework-agnostic. Holds the service registry, app-wide hooks,
/// per-service hooks and config.
pub struct InkApp<R, P = ()>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    inner: Arc<InkAppInner<R, P>>,
}

type HooksForMethod<R, P> = (
    Vec<Arc<dyn InkAroundHook<R, P>>>,
    Vec<Arc<dyn InkBeforeHook<R, P>>>,
    Vec<Arc<dyn InkAfterHook<R, P>>>,
    Vec<Arc<dyn InkErrorHook<R, P>>>,
);

impl<R, P> Default for InkApp<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R, P> Clone for InkApp<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R, P> InkApp<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(InkAppInner {
                registry: RwLock::new(ServiceRegistry::new()),
                global_hooks: RwLock::new(ServiceHooks::new()),
                service_hooks: RwLock::new(HashMap::new()),
                config: RwLock::new(InkConfig::new()),
                any_services: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn register_service<S>(&self, name: S, service: Arc<dyn InkService<R, P>>)
    where
        S: Into<String>,
    {
        let name = name.into();
        write(&self.inner.registry).register(name.clone(), Arc::clone(&service));
        write(&self.inner.any_services).insert(name, Box::new(service));
    }

    /// App-wide hooks; they run before any service-level hook.
    pub fn hooks<F>(&self, f: F)
    where
        F: FnOnce(&mut ServiceHooks<R, P>),
    {
        let mut g = write(&self.inner.global_hooks);
        f(&mut g);
    }

    pub(crate) fn configure_service_hooks<F>(&self, service_name: &str, f: F)
    where
        F: FnOnce(&mut ServiceHooks<R, P>),
    {
        let mut map = write(&self.inner.service_hooks);
        let hooks = map.entry(service_name.to_string()).or_default();
        f(hooks);
    }

    /// Handle for calling `name` through the hook pipeline.
    pub fn service(&self, name: &str) -> Result<ServiceHandle<R, P>> {
        let svc = read(&self.inner.registry)
            .get(name)
            .cloned()
            .ok_or_else(|| InkError::not_found(format!("Service not found: {name}")).into_anyhow())?;

        Ok(ServiceHandle {
            app: self.clone(),
            name: name.to_string(),
            service: svc,
        })
    }

    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.inner.registry)
            .names()
            .map(str::to_string)
            .collect();
        names.sort();
        names
    }

    pub fn set<K, V>(&self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        write(&self.inner.config).set(key, value);
    }

    pub fn get(&self, key: &str) -> Option<String> {
        read(&self.inner.config).get(key).map(|v| v.to_string())
    }

    /// Apply `PREFIX__A__B=v` overrides from the process environment.
    pub fn load_env(&self, prefix: &str) {
        write(&self.inner.config).load_env(prefix, std::env::vars());
    }

    pub fn config_snapshot(&self) -> ConfigSnapshot {
        read(&self.inner.config).snapshot()
    }
}

/// What the innermost step of the pipeline should invoke.
#[derive(Debug, Clone)]
enum Call {
    Find,
    Get(String),
    Create,
    Update(String),
    Patch(Option<String>),
    Remove(Option<String>),
}

impl Call {
    fn method(&self) -> ServiceMethodKind {
        match self {
            Call::Find => ServiceMethodKind::Find,
            Call::Get(_) => ServiceMethodKind::Get,
            Call::Create => ServiceMethodKind::Create,
            Call::Update(_) => ServiceMethodKind::Update,
            Call::Patch(_) => ServiceMethodKind::Patch,
            Call::Remove(_) => ServiceMethodKind::Remove,
        }
    }

    fn id(&self) -> Option<&str> {
        match self {
            Call::Get(id) | Call::Update(id) => Some(id),
            Call::Patch(id) | Call::Remove(id) => id.as_deref(),
            Call::Find | Call::Create => None,
        }
    }
}

fn take_data<R, P>(ctx: &mut HookContext<R, P>, method: &str) -> Result<R>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    ctx.data
        .take()
        .ok_or_else(|| InkError::bad_request(format!("{method}() requires data")).into_anyhow())
}

async fn dispatch<R, P>(
    svc: &Arc<dyn InkService<R, P>>,
    call: &Call,
    ctx: &mut HookContext<R, P>,
) -> Result<()>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    let tenant = ctx.tenant.clone();
    let params = ctx.params.clone();

    let result = match call {
        Call::Find => HookResult::Many(svc.find(&tenant, params).await?),
        Call::Get(id) => HookResult::One(svc.get(&tenant, id, params).await?),
        Call::Create => {
            let data = take_data(ctx, "create")?;
            HookResult::One(svc.create(&tenant, data, params).await?)
        }
        Call::Update(id) => {
            let data = take_data(ctx, "update")?;
            HookResult::One(svc.update(&tenant, id, data, params).await?)
        }
        Call::Patch(id) => {
            let data = take_data(ctx, "patch")?;
            HookResult::One(svc.patch(&tenant, id.as_deref(), data, params).await?)
        }
        Call::Remove(id) => HookResult::One(svc.remove(&tenant, id.as_deref(), params).await?),
    };

    ctx.result = Some(result);
    Ok(())
}

pub struct ServiceHandle<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    app: InkApp<R, P>,
    name: String,
    service: Arc<dyn InkService<R, P>>,
}

impl<R, P> ServiceHandle<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    /// Register hooks scoped to this service.
    pub fn hooks<F>(self, f: F) -> Self
    where
        F: FnOnce(&mut ServiceHooks<R, P>),
    {
        self.app.configure_service_hooks(&self.name, f);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inner(&self) -> &Arc<dyn InkService<R, P>> {
        &self.service
    }

    fn collect_hooks_for_method(&self, method: &ServiceMethodKind) -> HooksForMethod<R, P> {
        let g = read(&self.app.inner.global_hooks);
        let map = read(&self.app.inner.service_hooks);

        let mut around = collect_method_hooks(&g.around_all, &g.around_by_method, method);
        let mut before = collect_method_hooks(&g.before_all, &g.before_by_method, method);
        let mut after = collect_method_hooks(&g.after_all, &g.after_by_method, method);
        let mut error = collect_method_hooks(&g.error_all, &g.error_by_method, method);

        if let Some(h) = map.get(&self.name) {
            around.extend(collect_method_hooks(&h.around_all, &h.around_by_method, method));
            before.extend(collect_method_hooks(&h.before_all, &h.before_by_method, method));
            after.extend(collect_method_hooks(&h.after_all, &h.after_by_method, method));
            error.extend(collect_method_hooks(&h.error_all, &h.error_by_method, method));
        }

        (around, before, after, error)
    }

    /// around → before → service → after, then error hooks on failure.
    async fn run_pipeline(&self, call: Call, mut ctx: HookContext<R, P>) -> Result<HookContext<R, P>> {
        let (around, before, after, error) = self.collect_hooks_for_method(&call.method());
        let svc = Arc::clone(&self.service);

        let mut next: Next<R, P> = Next::new(move |ctx| {
            Box::pin(async move {
                for h in &before {
                    h.run(ctx).await?;
                }

                dispatch(&svc, &call, ctx).await?;

                for h in after.iter().rev() {
                    h.run(ctx).await?;
                }

                Ok(())
            })
        });

        // first registered around hook is the outermost
        for h in around.iter().rev() {
            let hook = Arc::clone(h);
            let prev = next;
            next = Next::new(move |ctx| Box::pin(async move { hook.run(ctx, prev).await }));
        }

        if let Err(e) = next.run(&mut ctx).await {
            ctx.error = Some(e);

            for h in &error {
                if let Err(hook_err) = h.run(&mut ctx).await {
                    ctx.error = Some(hook_err);
                }
            }

            if let Some(err) = ctx.error.take() {
                return Err(err);
            }
        }

        Ok(ctx)
    }

    async fn execute(
        &self,
        call: Call,
        tenant: TenantContext,
        params: P,
        data: Option<R>,
    ) -> Result<HookContext<R, P>> {
        let services = ServiceCaller::new(self.app.clone());
        let config = self.app.config_snapshot();
        let mut ctx = HookContext::new(tenant, self.name.clone(), call.method(), params, services, config);
        ctx.id = call.id().map(str::to_string);
        ctx.data = data;

        self.run_pipeline(call, ctx).await
    }

    fn expect_one(&self, ctx: HookContext<R, P>, method: &str) -> Result<R> {
        match ctx.result {
            Some(HookResult::One(v)) => Ok(v),
            Some(HookResult::Many(_)) => Err(anyhow::anyhow!(
                "{}.{method}() produced many records",
                self.name
            )),
            None => Err(anyhow::anyhow!("{}.{method}() produced no result", self.name)),
        }
    }

    pub async fn find(&self, tenant: TenantContext, params: P) -> Result<Vec<R>> {
        let ctx = self.execute(Call::Find, tenant, params, None).await?;
        match ctx.result {
            Some(HookResult::Many(v)) => Ok(v),
            Some(HookResult::One(v)) => Ok(vec![v]),
            None => Ok(vec![]),
        }
    }

    pub async fn get(&self, tenant: TenantContext, id: &str, params: P) -> Result<R> {
        let ctx = self
            .execute(Call::Get(id.to_string()), tenant, params, None)
            .await?;
        self.expect_one(ctx, "get")
    }

    pub async fn create(&self, tenant: TenantContext, data: R, params: P) -> Result<R> {
        let ctx = self.execute(Call::Create, tenant, params, Some(data)).await?;
        self.expect_one(ctx, "create")
    }

    pub async fn update(&self, tenant: TenantContext, id: &str, data: R, params: P) -> Result<R> {
        let ctx = self
            .execute(Call::Update(id.to_string()), tenant, params, Some(data))
            .await?;
        self.expect_one(ctx, "update")
    }

    pub async fn patch(
        &self,
        tenant: TenantContext,
        id: Option<&str>,
        data: R,
        params: P,
    ) -> Result<R> {
        let ctx = self
            .execute(Call::Patch(id.map(str::to_string)), tenant, params, Some(data))
            .await?;
        self.expect_one(ctx, "patch")
    }

    pub async fn remove(&self, tenant: TenantContext, id: Option<&str>, params: P) -> Result<R> {
        let ctx = self
            .execute(Call::Remove(id.map(str::to_string)), tenant, params, None)
            .await?;
        self.expect_one(ctx, "remove")
    }
}

/// Lets hooks reach sibling services of the same app.
pub struct ServiceCaller<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    app: InkApp<R, P>,
}

impl<R, P> Clone for ServiceCaller<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            app: self.app.clone(),
        }
    }
}

impl<R, P> ServiceCaller<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub fn new(app: InkApp<R, P>) -> Self {
        Self { app }
    }

    /// The raw service registered under `name`, bypassing its hooks.
    pub fn service<R2, P2>(&self, name: &str) -> Result<Arc<dyn InkService<R2, P2>>>
    where
        R2: Send + 'static,
        P2: Send + 'static,
    {
        let map = read(&self.app.inner.any_services);

        let any = map
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Service not found: {name}"))?;

        let stored = any
            .as_ref()
            .downcast_ref::<Arc<dyn InkService<R2, P2>>>()
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Service type mismatch for '{name}': requested a different <R, P> than registered"
                )
            })?;

        Ok(Arc::clone(stored))
    }

    /// Handle for `name` that runs through the hook pipeline.
    pub fn pipeline(&self, name: &str) -> Result<ServiceHandle<R, P>> {
        self.app.service(name)
    }
}
