// Protect hook.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use ink_core::hooks::InkAfterHook;
use ink_core::{HookContext, HookResult};
use serde_json::Value;

/// Removes sensitive keys anywhere in the results before they leave the
/// service.
pub struct ProtectHook {
    fields: HashSet<String>,
}

impl ProtectHook {
    pub fn from_fields(fields: &[&str]) -> Self {
        Self {
            fields: fields.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn strip(&self, mut v: Value) -> Value {
        Self::remove_deep_fields(&mut v, &self.fields);
        v
    }

    fn remove_deep_fields(v: &mut Value, fields: &HashSet<String>) {
        match v {
            Value::Object(map) => {
                for f in fields {
                    map.remove(f);
                }
                for (_, child) in map.iter_mut() {
                    Self::remove_deep_fields(child, fields);
                }
            }
            Value::Array(items) => {
                for child in items.iter_mut() {
                    Self::remove_deep_fields(child, fields);
                }
            }
            _ => {}
        }
    }
}

#[async_trait]
impl<P> InkAfterHook<Value, P> for ProtectHook
where
    P: Send + Clone + 'static,
{
    async fn run(&self, ctx: &mut HookContext<Value, P>) -> Result<()> {
        if let Some(res) = ctx.result.take() {
            ctx.result = Some(match res {
                HookResult::One(v) => HookResult::One(self.strip(v)),
                HookResult::Many(vs) => HookResult::Many(vs.into_iter().map(|v| self.strip(v)).collect()),
            });
        }
        Ok(())
    }
}
