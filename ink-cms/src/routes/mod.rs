//! Routes outside the REST service mounts: auth, dashboard and the
//! rendered public site.

use std::sync::Arc;

use ink_auth::Authenticator;
use ink_core::InkApp;
use ink_media::MediaAdapter;
use serde_json::Value;

use crate::config::CmsConfig;
use crate::render::Renderer;
use crate::services::CmsParams;
use crate::store::CmsState;

pub mod auth;
pub mod dashboard;
pub mod extract;
pub mod public;

/// Shared by every non-service handler.
#[derive(Clone)]
pub struct AppState {
    pub app: Arc<InkApp<Value, CmsParams>>,
    pub store: Arc<CmsState>,
    pub auth: Arc<Authenticator>,
    pub media: MediaAdapter,
    pub renderer: Arc<Renderer>,
    pub config: Arc<CmsConfig>,
}
