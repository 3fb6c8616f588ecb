use anyhow::Result;
use async_trait::async_trait;
use ink_auth::AuthError;
use ink_core::hooks::{HookContext, InkBeforeHook};
use serde_json::Value;

use crate::services::{Caller, CmsParams};

/// Admins reach every user; everyone else only their own record.
pub struct AdminOrSelf;

#[async_trait]
impl InkBeforeHook<Value, CmsParams> for AdminOrSelf {
    async fn run(&self, ctx: &mut HookContext<Value, CmsParams>) -> Result<()> {
        let caller = ctx.params.caller()?;
        let Caller::User(p) = caller else {
            return Ok(());
        };
        if p.is_admin() {
            return Ok(());
        }

        let own = ctx
            .id
            .as_deref()
            .and_then(|id| id.trim().parse::<u64>().ok())
            .is_some_and(|id| id == p.user_id);
        if own {
            Ok(())
        } else {
            Err(AuthError::forbidden("You can only access your own account").into_anyhow())
        }
    }
}
