pub mod app;
pub mod bootstrap;
pub mod config;
pub mod hooks;
pub mod models;
pub mod render;
pub mod routes;
pub mod services;
pub mod site;
pub mod store;
pub mod text;
pub mod validate;

use std::sync::Arc;

use anyhow::Result;
use ink_auth::{AuthError, Authenticator};
use ink_axum::{AxumApp, HostRules, Tenancy};
use ink_media::{FsBlobStore, MediaAdapter, MemoryBlobStore};
use serde_json::Value;

use crate::config::CmsConfig;
use crate::render::Renderer;
use crate::routes::AppState;
use crate::services::CmsParams;
use crate::store::CmsState;

/// A configured server: the routes plus the state behind them.
pub struct Inkwell {
    pub ax: AxumApp<Value, CmsParams>,
    pub state: AppState,
}

fn media_adapter(config: &CmsConfig) -> MediaAdapter {
    match &config.upload_folder {
        Some(root) => MediaAdapter::new(FsBlobStore::new(root), config.media.clone()),
        None => MediaAdapter::new(MemoryBlobStore::new(), config.media.clone()),
    }
}

fn tenancy(config: &CmsConfig, store: Arc<CmsState>) -> Tenancy {
    let mut rules = HostRules::new(config.main_domain.as_str());
    if !config.fallback_hosts.is_empty() {
        rules = rules.with_fallback_hosts(config.fallback_hosts.iter().cloned());
    }
    Tenancy::new(store, rules).exempt("/health")
}

pub async fn build(config: CmsConfig) -> Result<Inkwell> {
    let auth = Arc::new(Authenticator::new(config.auth.clone()).map_err(AuthError::into_anyhow)?);
    let store = Arc::new(CmsState::connect(&config.database_url, &config.default_tenant).await?);
    let media = media_adapter(&config);

    bootstrap::seed(&store, &auth, &config).await?;

    let ax = AxumApp::new(app::cms_app(&config, Arc::clone(&auth)));
    let svcs = services::configure(ax.app.as_ref(), Arc::clone(&store), Arc::clone(&auth), media.clone(), &config)?;

    let state = AppState {
        app: Arc::clone(&ax.app),
        store: Arc::clone(&store),
        auth,
        media,
        renderer: Arc::new(Renderer::new()?),
        config: Arc::new(config),
    };

    let ax = ax
        .with_tenancy(tenancy(&state.config, store))
        .use_service("/api/posts", svcs.posts)
        .use_service("/api/categories", svcs.categories)
        .use_service("/api/tags", svcs.tags)
        .use_service("/api/comments", svcs.comments)
        .use_service("/api/media", svcs.media)
        .use_service("/api/users", svcs.users)
        .use_service("/api/settings", svcs.settings)
        .use_service("/api/tenants", svcs.tenants)
        .use_router("/auth", routes::auth::router(state.clone()))
        .use_router("/dashboard", routes::dashboard::router(state.clone()))
        .use_router("/", routes::public::router(state.clone()))
        .use_get("/health", routes::public::health);

    Ok(Inkwell { ax, state })
}
