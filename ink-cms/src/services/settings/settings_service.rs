use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use ink_core::errors::InkError;
use ink_core::{InkService, ServiceCapabilities, TenantContext};
use serde_json::Value;

use crate::models::setting::stored_form;
use crate::models::{Setting, SettingType};
use crate::services::shared::{paginate, require_id, MAX_PER_PAGE};
use crate::services::CmsParams;
use crate::store::CmsState;
use crate::validate::{clean, validate};

use super::settings_schema::{CreateSetting, PatchSetting, ERROR_MESSAGE};
use super::settings_shared::{self, find_by_key, normalize_key};

/// Per-tenant settings, addressed by key rather than numeric id.
pub struct SettingsService {
    state: Arc<CmsState>,
}

impl SettingsService {
    pub fn new(state: Arc<CmsState>) -> Self {
        Self { state }
    }

    async fn require(&self, ctx: &TenantContext, key: &str) -> Result<Setting> {
        find_by_key(&self.state, ctx, key)
            .await?
            .ok_or_else(|| InkError::not_found(format!("No setting '{}'", key.trim())).into_anyhow())
    }

    async fn insert(&self, ctx: &TenantContext, input: CreateSetting) -> Result<Setting> {
        let key = normalize_key(&input.key);
        let data_type = input.data_type.unwrap_or_else(|| SettingType::of(&input.value));
        let value = stored_form(&input.value);
        let now = Utc::now();

        self.state
            .settings
            .insert_with(ctx, |id, rows| {
                if rows.values().any(|s| s.key == key) {
                    return Err(InkError::conflict(format!("Setting '{key}' already exists")).into_anyhow());
                }
                Ok(Setting {
                    id,
                    tenant_id: ctx.tenant_id.clone(),
                    key: key.clone(),
                    value,
                    data_type,
                    description: clean(input.description),
                    is_public: input.is_public,
                    created_at: now,
                    updated_at: now,
                })
            })
            .await
    }

    async fn change(&self, ctx: &TenantContext, key: &str, input: PatchSetting) -> Result<Setting> {
        let id = self.require(ctx, key).await?.id;
        self.state
            .settings
            .update_with(ctx, id, |s, _| {
                if let Some(value) = &input.value {
                    s.data_type = input.data_type.unwrap_or_else(|| SettingType::of(value));
                    s.value = stored_form(value);
                } else if let Some(data_type) = input.data_type {
                    s.data_type = data_type;
                }
                if let Some(description) = input.description {
                    s.description = clean(Some(description));
                }
                if let Some(public) = input.is_public {
                    s.is_public = public;
                }
                s.updated_at = Utc::now();
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl InkService<Value, CmsParams> for SettingsService {
    fn capabilities(&self) -> ServiceCapabilities {
        settings_shared::capabilities()
    }

    /// By key; `?public=true|false` filters.
    async fn find(&self, ctx: &TenantContext, params: CmsParams) -> Result<Vec<Value>> {
        let public = params.query_bool("public");
        let mut settings = self
            .state
            .settings
            .find(ctx, |s| public.map_or(true, |p| s.is_public == p))
            .await?;
        settings.sort_by(|a, b| a.key.cmp(&b.key));

        Ok(paginate(settings, &params, MAX_PER_PAGE)
            .iter()
            .map(|s| s.to_json())
            .collect())
    }

    async fn get(&self, ctx: &TenantContext, id: &str, _params: CmsParams) -> Result<Value> {
        Ok(self.require(ctx, id).await?.to_json())
    }

    async fn create(&self, ctx: &TenantContext, data: Value, _params: CmsParams) -> Result<Value> {
        let input: CreateSetting = validate(&data, ERROR_MESSAGE)?;
        let setting = self.insert(ctx, input).await?;
        tracing::debug!(tenant = %ctx.tenant_id, key = %setting.key, "setting created");
        Ok(setting.to_json())
    }

    /// Sets the value under `key`, creating the setting when missing.
    async fn update(&self, ctx: &TenantContext, id: &str, data: Value, _params: CmsParams) -> Result<Value> {
        let input: PatchSetting = validate(&data, ERROR_MESSAGE)?;
        if find_by_key(&self.state, ctx, id).await?.is_some() {
            return Ok(self.change(ctx, id, input).await?.to_json());
        }

        let setting = self
            .insert(
                ctx,
                CreateSetting {
                    key: id.to_string(),
                    value: input.value.unwrap_or(Value::Null),
                    data_type: input.data_type,
                    description: input.description,
                    is_public: input.is_public.unwrap_or(false),
                },
            )
            .await?;
        Ok(setting.to_json())
    }

    async fn patch(&self, ctx: &TenantContext, id: Option<&str>, data: Value, _params: CmsParams) -> Result<Value> {
        let key = require_id("Setting", id)?;
        let input: PatchSetting = validate(&data, ERROR_MESSAGE)?;
        Ok(self.change(ctx, key, input).await?.to_json())
    }

    async fn remove(&self, ctx: &TenantContext, id: Option<&str>, _params: CmsParams) -> Result<Value> {
        let key = require_id("Setting", id)?;
        let setting = self.require(ctx, key).await?;
        Ok(self.state.settings.remove(ctx, setting.id).await?.to_json())
    }
}
