use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use ink_auth::{Authenticator, HashPasswordHook, ProtectHook, Role};
use ink_core::errors::InkError;
use ink_core::{InkApp, ServiceCapabilities, ServiceMethodKind, TenantContext};
use serde_json::Value;

use crate::hooks::RequireAdmin;
use crate::models::User;
use crate::services::CmsParams;
use crate::store::{CmsState, Rows};

use super::users_hooks::AdminOrSelf;

pub fn capabilities() -> ServiceCapabilities {
    ServiceCapabilities::from_methods(vec![
        ServiceMethodKind::Find,
        ServiceMethodKind::Get,
        ServiceMethodKind::Create,
        ServiceMethodKind::Patch,
        ServiceMethodKind::Remove,
    ])
}

pub fn register_hooks(app: &InkApp<Value, CmsParams>, auth: Arc<Authenticator>) -> anyhow::Result<()> {
    app.service("users")?.hooks(|h| {
        h.before(ServiceMethodKind::Find, Arc::new(RequireAdmin));
        h.before_create(Arc::new(RequireAdmin));
        h.before_remove(Arc::new(RequireAdmin));
        h.before(ServiceMethodKind::Get, Arc::new(AdminOrSelf));
        h.before_patch(Arc::new(AdminOrSelf));

        h.before_create(Arc::new(HashPasswordHook::new(Arc::clone(&auth))));
        h.before_patch(Arc::new(HashPasswordHook::new(auth)));

        h.after_all(Arc::new(ProtectHook::from_fields(&["password_hash", "password_reset_token"])));
    });
    Ok(())
}

/// Everything needed to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_active: bool,
    pub is_super_admin: bool,
}

/// Email and username are unique per tenant, ignoring case.
pub fn check_unique(rows: &Rows<User>, email: Option<&str>, username: Option<&str>) -> Result<()> {
    if let Some(email) = email {
        if rows.values().any(|u| u.email.eq_ignore_ascii_case(email)) {
            return Err(InkError::conflict("Email already registered").into_anyhow());
        }
    }
    if let Some(username) = username {
        if rows.values().any(|u| u.username.eq_ignore_ascii_case(username)) {
            return Err(InkError::conflict("Username already taken").into_anyhow());
        }
    }
    Ok(())
}

pub async fn insert_user(state: &CmsState, ctx: &TenantContext, new: NewUser) -> Result<User> {
    let email = new.email.trim().to_lowercase();
    let username = new.username.trim().to_string();
    let now = Utc::now();

    let user = state
        .users
        .insert_with(ctx, |id, rows| {
            check_unique(rows, Some(&email), Some(&username))?;
            Ok(User {
                id,
                tenant_id: ctx.tenant_id.clone(),
                email: email.clone(),
                username: username.clone(),
                first_name: new.first_name.trim().to_string(),
                last_name: new.last_name.trim().to_string(),
                password_hash: new.password_hash,
                role: new.role,
                is_active: new.is_active,
                is_super_admin: new.is_super_admin,
                bio: None,
                avatar_url: None,
                website_url: None,
                password_reset_token: None,
                password_reset_expires: None,
                last_login: None,
                created_at: now,
                updated_at: now,
            })
        })
        .await?;

    tracing::info!(tenant = %ctx.tenant_id, user = user.id, role = %user.role, "user created");
    Ok(user)
}

/// First user whose email or username is `login`.
pub async fn find_by_login(state: &CmsState, ctx: &TenantContext, login: &str) -> Result<Option<User>> {
    state.users.find_one(ctx, |u| u.answers_to(login)).await
}
