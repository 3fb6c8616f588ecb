use std::sync::Arc;

use anyhow::Result;
use ink_core::{InkApp, ServiceCapabilities, ServiceMethodKind, TenantContext};
use serde_json::{Map, Value};

use crate::hooks::RequireAdmin;
use crate::models::Setting;
use crate::services::CmsParams;
use crate::store::CmsState;

pub fn capabilities() -> ServiceCapabilities {
    ServiceCapabilities::from_methods(vec![
        ServiceMethodKind::Find,
        ServiceMethodKind::Get,
        ServiceMethodKind::Create,
        ServiceMethodKind::Update,
        ServiceMethodKind::Patch,
        ServiceMethodKind::Remove,
    ])
}

pub fn register_hooks(app: &InkApp<Value, CmsParams>) -> anyhow::Result<()> {
    app.service("settings")?.hooks(|h| {
        h.before_all(Arc::new(RequireAdmin));
    });
    Ok(())
}

/// Keys are trimmed and compared case-sensitively.
pub fn normalize_key(key: &str) -> String {
    key.trim().to_string()
}

pub async fn find_by_key(state: &CmsState, ctx: &TenantContext, key: &str) -> Result<Option<Setting>> {
    let key = normalize_key(key);
    state.settings.find_one(ctx, |s| s.key == key).await
}

/// `{key: typed value}` of the tenant's public settings, for templates.
pub async fn public_settings(state: &CmsState, ctx: &TenantContext) -> Result<Map<String, Value>> {
    Ok(state
        .settings
        .find(ctx, |s| s.is_public)
        .await?
        .into_iter()
        .map(|s| {
            let value = s.typed_value();
            (s.key, value)
        })
        .collect())
}
