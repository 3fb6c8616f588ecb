use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use ink_auth::{AuthenticateHook, Authenticator};
use ink_core::errors::InkError;
use ink_core::hooks::{HookContext, InkAroundHook, InkBeforeHook, Next};
use ink_core::InkApp;
use serde_json::Value;

use crate::services::CmsParams;

/// Logs every service call with its tenant and outcome.
pub struct LogAround;

#[async_trait]
impl InkAroundHook<Value, CmsParams> for LogAround {
    async fn run(&self, ctx: &mut HookContext<Value, CmsParams>, next: Next<Value, CmsParams>) -> Result<()> {
        let started = Instant::now();
        let service = ctx.service.clone();
        let method = ctx.method.as_str();
        let tenant = ctx.tenant.tenant_id.to_string();
        let provider = ctx.params.provider.clone().unwrap_or_else(|| "internal".to_string());

        tracing::debug!(%service, method, %tenant, %provider, "service call");

        let res = next.run(ctx).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &res {
            Ok(()) => tracing::debug!(%service, method, %tenant, elapsed_ms, "service call ok"),
            Err(e) => {
                let kind = InkError::kind_of(e);
                if kind.status_code() >= 500 {
                    tracing::error!(%service, method, %tenant, elapsed_ms, error = ?e, "service call failed");
                } else {
                    tracing::warn!(%service, method, %tenant, elapsed_ms, error = %e, "service call rejected");
                }
            }
        }

        res
    }
}

/// Tenant admins (and internal calls) only.
pub struct RequireAdmin;

#[async_trait]
impl InkBeforeHook<Value, CmsParams> for RequireAdmin {
    async fn run(&self, ctx: &mut HookContext<Value, CmsParams>) -> Result<()> {
        ctx.params.caller()?.require_admin()
    }
}

/// Super admins (and internal calls) only.
pub struct RequireSuperAdmin;

#[async_trait]
impl InkBeforeHook<Value, CmsParams> for RequireSuperAdmin {
    async fn run(&self, ctx: &mut HookContext<Value, CmsParams>) -> Result<()> {
        ctx.params.caller()?.require_super_admin()
    }
}

/// Logging first, then authentication of REST calls.
pub fn global_hooks(app: &InkApp<Value, CmsParams>, auth: Arc<Authenticator>) {
    app.hooks(|h| {
        h.around_all(Arc::new(LogAround));
        h.before_all(Arc::new(AuthenticateHook::new(auth)));
    });
}
