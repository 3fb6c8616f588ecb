use std::collections::HashMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::Json;
use ink_auth::{AuthError, Principal};
use ink_axum::{InkAxumError, Tenant};
use ink_core::errors::InkError;
use ink_core::TenantContext;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::models::User;

use super::AppState;

/// The signed-in, active user of the request's tenant.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub tenant: TenantContext,
    pub principal: Principal,
    pub user: User,
}

fn header_map(parts: &Parts) -> HashMap<String, String> {
    parts
        .headers
        .iter()
        .filter_map(|(k, v)| Some((k.as_str().to_ascii_lowercase(), v.to_str().ok()?.to_string())))
        .collect()
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = InkAxumError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Tenant(tenant) = Tenant::from_request_parts(parts, state).await?;
        let principal = state
            .auth
            .authenticate(&tenant, &header_map(parts))
            .map_err(AuthError::into_anyhow)?;

        // Super admins may act on other tenants; their record lives at home.
        let home = TenantContext::new(principal.tenant_id.as_str());
        let user = state
            .store
            .users
            .get(&home, principal.user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| AuthError::InvalidToken("account is no longer active".into()).into_anyhow())?;

        Ok(CurrentUser { tenant, principal, user })
    }
}

/// `Json<T>` whose rejections answer in the structured error shape.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = InkAxumError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> InkAxumError {
    InkError::bad_request("Failed to parse the request body as JSON")
        .with_errors(json!({"_schema": [rejection.body_text()]}))
        .into()
}
