// Authenticate hook.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use ink_core::hooks::InkBeforeHook;
use ink_core::HookContext;

use crate::core::Authenticator;
use crate::role::Principal;

/// What [`AuthenticateHook`] needs to read from and write into params.
pub trait AuthenticateHookParams: Clone + Send + Sync {
    /// Transport name; `None` marks an internal call.
    fn provider(&self) -> Option<&str>;
    fn headers(&self) -> &HashMap<String, String>;
    fn principal(&self) -> Option<&Principal>;
    fn set_principal(&mut self, principal: Principal);
}

/// Requires a valid bearer token for external calls and records the
/// principal in params. Calls that already carry a principal pass through.
pub struct AuthenticateHook {
    auth: Arc<Authenticator>,
}

impl AuthenticateHook {
    pub fn new(auth: Arc<Authenticator>) -> Self {
        Self { auth }
    }
}

#[async_trait]
impl<R, P> InkBeforeHook<R, P> for AuthenticateHook
where
    R: Send + 'static,
    P: AuthenticateHookParams + 'static,
{
    async fn run(&self, ctx: &mut HookContext<R, P>) -> Result<()> {
        if ctx.params.principal().is_some() {
            return Ok(());
        }

        if ctx.params.provider().map_or(true, |p| p.trim().is_empty()) {
            // Internal call: allow through.
            return Ok(());
        }

        let principal = self
            .auth
            .authenticate(&ctx.tenant, ctx.params.headers())
            .map_err(|e| e.into_anyhow())?;

        ctx.params.set_principal(principal);
        Ok(())
    }
}
