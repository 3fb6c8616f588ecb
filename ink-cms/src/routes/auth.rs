//! Registration, login and account maintenance for the request's tenant.

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::Utc;
use ink_auth::{check_reset_token, AuthError};
use ink_axum::{InkAxumError, Tenant};
use ink_core::errors::InkError;
use ink_core::TenantContext;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::services::users::users_shared::find_by_login;
use crate::services::CmsParams;

use super::extract::{CurrentUser, JsonBody};
use super::AppState;

type JsonResult = Result<Json<Value>, InkAxumError>;

const PROFILE_FIELDS: &[&str] = &["first_name", "last_name", "bio", "website_url", "avatar_url"];

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    /// Email or username.
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordBody {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordBody {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordBody {
    #[serde(default)]
    pub password: String,
}

pub fn router(state: AppState) -> Router<()> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/profile", patch(update_profile))
        .route("/change-password", post(change_password))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password/{token}", post(reset_password))
        .with_state(state)
}

/// New accounts are always editors of the tenant they registered on.
/// Addresses on the super admin list can't be registered.
async fn register(State(st): State<AppState>, Tenant(tenant): Tenant, JsonBody(body): JsonBody<RegisterBody>) -> JsonResult {
    if st.auth.options().is_super_admin_email(&body.email) {
        tracing::warn!(tenant = %tenant.tenant_id, "registration with a reserved address refused");
        return Err(InkError::forbidden("This email address cannot be registered").into());
    }

    let data = json!({
        "email": body.email,
        "username": body.username,
        "password": body.password,
        "first_name": body.first_name,
        "last_name": body.last_name,
        "role": "editor",
    });

    let user = st
        .app
        .service("users")?
        .create(tenant.clone(), data, CmsParams::system())
        .await?;

    tracing::info!(tenant = %tenant.tenant_id, user = %user["id"], "registered");
    Ok(Json(json!({
        "success": true,
        "message": "Registration successful! Please log in.",
        "user": user,
    })))
}

async fn login(State(st): State<AppState>, Tenant(tenant): Tenant, JsonBody(body): JsonBody<LoginBody>) -> JsonResult {
    let user = find_by_login(&st.store, &tenant, &body.username)
        .await?
        .filter(|u| u.is_active)
        .filter(|u| st.auth.verify_password(&body.password, &u.password_hash));

    let Some(user) = user else {
        tracing::debug!(tenant = %tenant.tenant_id, "login rejected");
        return Err(AuthError::InvalidCredentials.into_anyhow().into());
    };

    let principal = user.principal();
    let token = st.auth.issue_token(&principal).map_err(AuthError::into_anyhow)?;

    let user = st
        .store
        .users
        .update_with(&tenant, user.id, |u, _| {
            u.last_login = Some(Utc::now());
            Ok(())
        })
        .await?;

    tracing::info!(tenant = %tenant.tenant_id, user = user.id, super_admin = user.is_super_admin, "logged in");
    Ok(Json(json!({
        "success": true,
        "accessToken": token,
        "user": user.to_json(),
    })))
}

/// Tokens are stateless; clients drop theirs.
async fn logout() -> Json<Value> {
    Json(json!({"success": true, "message": "You have been logged out."}))
}

async fn me(current: CurrentUser) -> Json<Value> {
    Json(json!({"success": true, "user": current.user.to_json()}))
}

async fn update_profile(State(st): State<AppState>, current: CurrentUser, JsonBody(body): JsonBody<Map<String, Value>>) -> JsonResult {
    let changes: Map<String, Value> = body
        .into_iter()
        .filter(|(k, _)| PROFILE_FIELDS.contains(&k.as_str()))
        .collect();

    let home = TenantContext::new(current.user.tenant_id.as_str());
    let user = st
        .app
        .service("users")?
        .patch(
            home,
            Some(&current.user.id.to_string()),
            Value::Object(changes),
            CmsParams::for_user(current.principal),
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Profile updated successfully!",
        "user": user,
    })))
}

async fn change_password(
    State(st): State<AppState>,
    current: CurrentUser,
    JsonBody(body): JsonBody<ChangePasswordBody>,
) -> JsonResult {
    if !st.auth.verify_password(&body.current_password, &current.user.password_hash) {
        return Err(InkError::bad_request("Current password is incorrect").into());
    }

    let home = TenantContext::new(current.user.tenant_id.as_str());
    st.app
        .service("users")?
        .patch(
            home,
            Some(&current.user.id.to_string()),
            json!({"password": body.new_password}),
            CmsParams::for_user(current.principal),
        )
        .await?;

    Ok(Json(json!({"success": true, "message": "Password changed successfully!"})))
}

/// Answers the same whether or not the email is known. Outside production
/// the token is returned, as nothing sends the email.
async fn forgot_password(
    State(st): State<AppState>,
    Tenant(tenant): Tenant,
    JsonBody(body): JsonBody<ForgotPasswordBody>,
) -> JsonResult {
    let email = body.email.trim().to_lowercase();
    let mut response = json!({
        "success": true,
        "message": "If an account with that email exists, a password reset link has been sent.",
    });

    let user = st.store.users.find_one(&tenant, |u| u.email == email && u.is_active).await?;
    if let Some(user) = user {
        let reset = st.auth.issue_reset_token();
        st.store
            .users
            .update_with(&tenant, user.id, |u, _| {
                u.password_reset_token = Some(reset.token.clone());
                u.password_reset_expires = Some(reset.expires_at);
                Ok(())
            })
            .await?;

        tracing::info!(tenant = %tenant.tenant_id, user = user.id, "password reset requested");
        if !st.config.env.is_production() {
            response["resetToken"] = Value::String(reset.token);
        }
    }

    Ok(Json(response))
}

async fn reset_password(
    State(st): State<AppState>,
    Tenant(tenant): Tenant,
    Path(token): Path<String>,
    JsonBody(body): JsonBody<ResetPasswordBody>,
) -> JsonResult {
    let user = st
        .store
        .users
        .find_one(&tenant, |u| u.password_reset_token.as_deref() == Some(token.as_str()))
        .await?
        .ok_or_else(|| AuthError::InvalidResetToken.into_anyhow())?;

    let now = Utc::now();
    check_reset_token(user.password_reset_token.as_deref(), user.password_reset_expires, &token, now)
        .map_err(AuthError::into_anyhow)?;
    let hash = st.auth.hash_password(&body.password).map_err(AuthError::into_anyhow)?;

    st.store
        .users
        .update_with(&tenant, user.id, |u, _| {
            u.password_hash = hash;
            u.password_reset_token = None;
            u.password_reset_expires = None;
            u.updated_at = now;
            Ok(())
        })
        .await?;

    tracing::info!(tenant = %tenant.tenant_id, user = user.id, "password reset");
    Ok(Json(json!({"success": true, "message": "Your password has been reset. Please log in."})))
}
