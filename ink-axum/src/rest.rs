use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::rejection::JsonRejection,
    extract::{OriginalUri, Path, Query, State},
    http::{HeaderMap, Method},
    routing, Json, Router,
};
use ink_core::errors::InkError;
use ink_core::{InkApp, ServiceHandle, ServiceMethodKind};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use crate::{
    params::{FromRestParams, RestParams},
    tenancy::Tenant,
    InkAxumError, InkAxumState,
};

type QueryMap = Query<HashMap<String, String>>;

fn map_json_rejection(rejection: JsonRejection) -> InkAxumError {
    InkError::bad_request("Failed to parse the request body as JSON")
        .with_errors(json!({"_schema": [rejection.body_text()]}))
        .into()
}

/// Looks the service up and refuses methods it doesn't expose.
fn exposed<R, P>(
    state: &InkAxumState<R, P>,
    name: &str,
    method: ServiceMethodKind,
) -> Result<ServiceHandle<R, P>, InkAxumError>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    let svc = state.app.service(name)?;
    if !svc.inner().capabilities().allows(&method) {
        return Err(InkError::method_not_allowed(format!(
            "Method '{}' is not allowed on '{name}'",
            method.as_str()
        ))
        .into());
    }
    Ok(svc)
}

fn params<P: FromRestParams>(headers: &HeaderMap, query: HashMap<String, String>, method: Method, uri: &axum::http::Uri) -> P {
    P::from_rest_params(RestParams::from_parts("rest", headers, query, method.as_str(), uri))
}

/// REST routes for one registered service:
///
/// | verb   | path   | method |
/// |--------|--------|--------|
/// | GET    | `/`    | find   |
/// | POST   | `/`    | create |
/// | GET    | `/:id` | get    |
/// | PUT    | `/:id` | update |
/// | PATCH  | `/:id` | patch  |
/// | DELETE | `/:id` | remove |
///
/// The tenant always comes from the resolved request host.
pub fn service_router<R, P>(service_name: Arc<String>, app: Arc<InkApp<R, P>>) -> Router<()>
where
    R: Serialize + DeserializeOwned + Send + Sync + 'static,
    P: FromRestParams + Send + Sync + Clone + 'static,
{
    let state = InkAxumState { app };

    Router::new()
        .route(
            "/",
            routing::get({
                let service_name = Arc::clone(&service_name);
                move |State(state): State<InkAxumState<R, P>>,
                      Tenant(tenant): Tenant,
                      method: Method,
                      headers: HeaderMap,
                      Query(query): QueryMap,
                      OriginalUri(uri): OriginalUri| async move {
                    let svc = exposed(&state, &service_name, ServiceMethodKind::Find)?;
                    let res = svc.find(tenant, params(&headers, query, method, &uri)).await?;
                    Ok::<_, InkAxumError>(Json(res))
                }
            })
            .post({
                let service_name = Arc::clone(&service_name);
                move |State(state): State<InkAxumState<R, P>>,
                      Tenant(tenant): Tenant,
                      method: Method,
                      headers: HeaderMap,
                      Query(query): QueryMap,
                      OriginalUri(uri): OriginalUri,
                      data: Result<Json<R>, JsonRejection>| async move {
                    let svc = exposed(&state, &service_name, ServiceMethodKind::Create)?;
                    let Json(data) = data.map_err(map_json_rejection)?;
                    let res = svc.create(tenant, data, params(&headers, query, method, &uri)).await?;
                    Ok::<_, InkAxumError>(Json(res))
                }
            }),
        )
        .route(
            "/{id}",
            routing::get({
                let service_name = Arc::clone(&service_name);
                move |State(state): State<InkAxumState<R, P>>,
                      Tenant(tenant): Tenant,
                      method: Method,
                      headers: HeaderMap,
                      Query(query): QueryMap,
                      OriginalUri(uri): OriginalUri,
                      Path(id): Path<String>| async move {
                    let svc = exposed(&state, &service_name, ServiceMethodKind::Get)?;
                    let res = svc.get(tenant, &id, params(&headers, query, method, &uri)).await?;
                    Ok::<_, InkAxumError>(Json(res))
                }
            })
            .put({
                let service_name = Arc::clone(&service_name);
                move |State(state): State<InkAxumState<R, P>>,
                      Tenant(tenant): Tenant,
                      method: Method,
                      headers: HeaderMap,
                      Query(query): QueryMap,
                      OriginalUri(uri): OriginalUri,
                      Path(id): Path<String>,
                      data: Result<Json<R>, JsonRejection>| async move {
                    let svc = exposed(&state, &service_name, ServiceMethodKind::Update)?;
                    let Json(data) = data.map_err(map_json_rejection)?;
                    let res = svc
                        .update(tenant, &id, data, params(&headers, query, method, &uri))
                        .await?;
                    Ok::<_, InkAxumError>(Json(res))
                }
            })
            .patch({
                let service_name = Arc::clone(&service_name);
                move |State(state): State<InkAxumState<R, P>>,
                      Tenant(tenant): Tenant,
                      method: Method,
                      headers: HeaderMap,
                      Query(query): QueryMap,
                      OriginalUri(uri): OriginalUri,
                      Path(id): Path<String>,
                      data: Result<Json<R>, JsonRejection>| async move {
                    let svc = exposed(&state, &service_name, ServiceMethodKind::Patch)?;
                    let Json(data) = data.map_err(map_json_rejection)?;
                    let res = svc
                        .patch(tenant, Some(&id), data, params(&headers, query, method, &uri))
                        .await?;
                    Ok::<_, InkAxumError>(Json(res))
                }
            })
            .delete({
                let service_name = Arc::clone(&service_name);
                move |State(state): State<InkAxumState<R, P>>,
                      Tenant(tenant): Tenant,
                      method: Method,
                      headers: HeaderMap,
                      Query(query): QueryMap,
                      OriginalUri(uri): OriginalUri,
                      Path(id): Path<String>| async move {
                    let svc = exposed(&state, &service_name, ServiceMethodKind::Remove)?;
                    let res = svc
                        .remove(tenant, Some(&id), params(&headers, query, method, &uri))
                        .await?;
                    Ok::<_, InkAxumError>(Json(res))
                }
            }),
        )
        .with_state(state)
}
