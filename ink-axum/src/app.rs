use std::sync::Arc;

use axum::body::Body;
use axum::handler::Handler;
use axum::http::{HeaderName, Request};
use axum::routing::get;
use axum::Router;
use ink_core::{InkApp, InkService};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::{TcpListener, ToSocketAddrs};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::params::FromRestParams;
use crate::rest;
use crate::tenancy::{resolve_tenant, Tenancy};

const REQUEST_ID: &str = "x-request-id";

/// An [`InkApp`] plus the axum routes exposing it.
///
/// Routes are collected with `use_*`; [`AxumApp::router`] wraps them with
/// tenant resolution, request ids and tracing.
pub struct AxumApp<R, P = ()>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    pub app: Arc<InkApp<R, P>>,
    pub routes: Router<()>,
    tenancy: Option<Tenancy>,
}

impl<R, P> Clone for AxumApp<R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            app: Arc::clone(&self.app),
            routes: self.routes.clone(),
            tenancy: self.tenancy.clone(),
        }
    }
}

impl<R, P> AxumApp<R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    pub fn new(app: InkApp<R, P>) -> Self {
        Self {
            app: Arc::new(app),
            routes: Router::new(),
            tenancy: None,
        }
    }

    /// Resolve a tenant from the `Host` header of every request.
    pub fn with_tenancy(mut self, tenancy: Tenancy) -> Self {
        self.tenancy = Some(tenancy);
        self
    }

    pub fn use_router(mut self, path: &str, router: Router<()>) -> Self {
        self.routes = if path.is_empty() || path == "/" {
            self.routes.merge(router)
        } else {
            self.routes.nest(path, router)
        };
        self
    }

    pub fn use_get<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()> + Clone + Send + Sync + 'static,
        T: 'static,
    {
        let router = Router::new().route(path, get(handler));
        self.use_router("/", router)
    }

    /// Register `service` under `path` and mount its REST routes there.
    pub fn use_service(mut self, path: &'static str, service: Arc<dyn InkService<R, P>>) -> Self
    where
        R: Serialize + DeserializeOwned,
        P: FromRestParams,
    {
        let name = path.trim_start_matches('/').rsplit('/').next().unwrap_or(path);
        self.app.register_service(name, service);

        let router = rest::service_router(Arc::new(name.to_string()), Arc::clone(&self.app));
        self.routes = self.routes.nest(path, router);
        self
    }

    /// The routes with tenant resolution, request ids and tracing applied.
    pub fn router(&self) -> Router<()> {
        let mut router = self.routes.clone();

        if let Some(tenancy) = &self.tenancy {
            router = router.layer(axum::middleware::from_fn_with_state(tenancy.clone(), resolve_tenant));
        }

        let request_id = HeaderName::from_static(REQUEST_ID);
        router
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                let id = req
                    .headers()
                    .get(REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http",
                    method = %req.method(),
                    uri = %req.uri(),
                    host = req.headers().get("host").and_then(|v| v.to_str().ok()).unwrap_or("-"),
                    request_id = %id,
                )
            }))
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
    }

    pub async fn listen<A>(self, addr: A) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
    {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "listening");
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

pub fn axum<R, P>(app: InkApp<R, P>) -> AxumApp<R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    AxumApp::new(app)
}
