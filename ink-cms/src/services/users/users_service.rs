use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use ink_core::errors::InkError;
use ink_core::{InkService, ServiceCapabilities, TenantContext};
use serde_json::{json, Value};

use crate::models::user::normalize_website;
use crate::services::shared::{paginate, require_id, MAX_PER_PAGE};
use crate::services::{Caller, CmsParams};
use crate::store::{parse_id, CmsState};
use crate::validate::{clean, validate};

use super::users_schema::{CreateUser, PatchUser, ERROR_MESSAGE};
use super::users_shared::{self, check_unique, insert_user, NewUser};

pub struct UsersService {
    state: Arc<CmsState>,
}

impl UsersService {
    pub fn new(state: Arc<CmsState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl InkService<Value, CmsParams> for UsersService {
    fn capabilities(&self) -> ServiceCapabilities {
        users_shared::capabilities()
    }

    /// By username. `?role=`, `?active=` and `?q=` (name, email) filter.
    async fn find(&self, ctx: &TenantContext, params: CmsParams) -> Result<Vec<Value>> {
        let role = params
            .query_str("role")
            .map(str::parse::<ink_auth::Role>)
            .transpose()
            .map_err(|e| InkError::bad_request(e).into_anyhow())?;
        let active = params.query_bool("active");
        let needle = params.query_str("q").map(str::to_lowercase);

        let mut users = self
            .state
            .users
            .find(ctx, |u| {
                role.map_or(true, |r| u.role == r)
                    && active.map_or(true, |a| u.is_active == a)
                    && needle.as_deref().map_or(true, |q| {
                        u.username.to_lowercase().contains(q)
                            || u.email.contains(q)
                            || u.full_name().to_lowercase().contains(q)
                    })
            })
            .await?;
        users.sort_by_key(|u| u.username.to_lowercase());

        Ok(paginate(users, &params, MAX_PER_PAGE)
            .iter()
            .map(|u| u.to_json())
            .collect())
    }

    async fn get(&self, ctx: &TenantContext, id: &str, _params: CmsParams) -> Result<Value> {
        let id = parse_id("User", id)?;
        Ok(self.state.users.require(ctx, id).await?.to_json())
    }

    async fn create(&self, ctx: &TenantContext, data: Value, _params: CmsParams) -> Result<Value> {
        let input: CreateUser = validate(&data, ERROR_MESSAGE)?;
        let Some(password_hash) = input.password_hash else {
            return Err(InkError::unprocessable(ERROR_MESSAGE)
                .with_errors(json!({"password": ["is required"]}))
                .into_anyhow());
        };

        let mut user = insert_user(
            &self.state,
            ctx,
            NewUser {
                email: input.email,
                username: input.username,
                password_hash,
                first_name: input.first_name.unwrap_or_default(),
                last_name: input.last_name.unwrap_or_default(),
                role: input.role.unwrap_or_default(),
                is_active: input.is_active.unwrap_or(true),
                is_super_admin: false,
            },
        )
        .await?;

        let bio = clean(input.bio);
        let avatar_url = clean(input.avatar_url);
        let website_url = input.website_url.as_deref().and_then(normalize_website);
        if bio.is_some() || avatar_url.is_some() || website_url.is_some() {
            user = self
                .state
                .users
                .update_with(ctx, user.id, |u, _| {
                    u.bio = bio;
                    u.avatar_url = avatar_url;
                    u.website_url = website_url;
                    Ok(())
                })
                .await?;
        }

        Ok(user.to_json())
    }

    /// Admins change anything; users change their own profile fields and
    /// password but not their role or status.
    async fn patch(&self, ctx: &TenantContext, id: Option<&str>, data: Value, params: CmsParams) -> Result<Value> {
        let caller = params.caller()?;
        let id = parse_id("User", require_id("User", id)?)?;
        let input: PatchUser = validate(&data, ERROR_MESSAGE)?;

        if !caller.is_admin() && (input.role.is_some() || input.is_active.is_some()) {
            return Err(InkError::forbidden("Only admins can change roles or account status").into_anyhow());
        }
        if caller.user_id() == Some(id) && input.is_active == Some(false) {
            return Err(InkError::bad_request("You cannot deactivate your own account").into_anyhow());
        }

        let user = self
            .state
            .users
            .update_with(ctx, id, |u, rows| {
                let email = input.email.map(|e| e.trim().to_lowercase());
                let username = input.username.map(|n| n.trim().to_string());
                check_unique(rows, email.as_deref(), username.as_deref())?;

                if let Some(email) = email {
                    u.email = email;
                }
                if let Some(username) = username {
                    u.username = username;
                }
                if let Some(hash) = input.password_hash {
                    u.password_hash = hash;
                    u.password_reset_token = None;
                    u.password_reset_expires = None;
                }
                if let Some(first) = input.first_name {
                    u.first_name = first.trim().to_string();
                }
                if let Some(last) = input.last_name {
                    u.last_name = last.trim().to_string();
                }
                if let Some(role) = input.role {
                    u.role = role;
                }
                if let Some(active) = input.is_active {
                    u.is_active = active;
                }
                if let Some(bio) = input.bio {
                    u.bio = clean(Some(bio));
                }
                if let Some(avatar) = input.avatar_url {
                    u.avatar_url = clean(Some(avatar));
                }
                if let Some(website) = input.website_url {
                    u.website_url = normalize_website(&website);
                }
                u.updated_at = Utc::now();
                Ok(())
            })
            .await?;

        Ok(user.to_json())
    }

    /// Admins can't remove themselves, and authors with posts stay.
    async fn remove(&self, ctx: &TenantContext, id: Option<&str>, params: CmsParams) -> Result<Value> {
        let caller = params.caller()?;
        let id = parse_id("User", require_id("User", id)?)?;
        if let Caller::User(p) = caller {
            if p.user_id == id {
                return Err(InkError::bad_request("You cannot delete your own account").into_anyhow());
            }
        }

        self.state.users.require(ctx, id).await?;
        let posts = self.state.posts.count(ctx, |p| p.author_id == id).await?;
        if posts > 0 {
            return Err(InkError::conflict(format!(
                "User still authors {posts} post(s); reassign or delete them first"
            ))
            .into_anyhow());
        }

        let user = self.state.users.remove(ctx, id).await?;
        tracing::info!(tenant = %ctx.tenant_id, user = id, "user removed");
        Ok(user.to_json())
    }
}
