// Hash password hook.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use ink_core::errors::InkError;
use ink_core::hooks::InkBeforeHook;
use ink_core::HookContext;
use serde_json::Value;

use crate::core::Authenticator;

/// Replaces a plain password field of the incoming record with its bcrypt
/// hash under another field. Records without the field pass unchanged.
pub struct HashPasswordHook {
    pub field: String,
    pub target: String,
    auth: Arc<Authenticator>,
}

impl HashPasswordHook {
    pub fn new(auth: Arc<Authenticator>) -> Self {
        Self {
            field: "password".to_string(),
            target: "password_hash".to_string(),
            auth,
        }
    }

    pub fn with_fields(mut self, field: impl Into<String>, target: impl Into<String>) -> Self {
        self.field = field.into();
        self.target = target.into();
        self
    }

    fn hash_one(&self, mut v: Value) -> Result<Value> {
        let Some(map) = v.as_object_mut() else {
            return Ok(v);
        };
        // The incoming record must never carry a hash of its own.
        map.remove(&self.target);

        let Some(pw) = map.remove(&self.field) else {
            return Ok(v);
        };
        let Some(pw) = pw.as_str() else {
            return Err(InkError::bad_request("Password must be a string").into_anyhow());
        };

        let hashed = self.auth.hash_password(pw).map_err(|e| e.into_anyhow())?;
        map.insert(self.target.clone(), Value::String(hashed));
        Ok(v)
    }
}

#[async_trait]
impl<P> InkBeforeHook<Value, P> for HashPasswordHook
where
    P: Send + Clone + 'static,
{
    async fn run(&self, ctx: &mut HookContext<Value, P>) -> Result<()> {
        let Some(data) = ctx.data.take() else {
            return Ok(());
        };

        ctx.data = Some(match data {
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|v| self.hash_one(v))
                    .collect::<Result<Vec<_>>>()?,
            ),
            other => self.hash_one(other)?,
        });

        Ok(())
    }
}
