use std::sync::Arc;

use ink_auth::Authenticator;
use ink_core::InkApp;
use serde_json::Value;

use crate::config::CmsConfig;
use crate::services::CmsParams;

/// The service container with its configuration keys and app-wide hooks.
pub fn cms_app(config: &CmsConfig, auth: Arc<Authenticator>) -> InkApp<Value, CmsParams> {
    let app: InkApp<Value, CmsParams> = InkApp::new();
    app.set("app.env", config.env.as_str());
    app.set("http.host", config.host.as_str());
    app.set("http.port", config.port.to_string());
    app.set("tenancy.main_domain", config.main_domain.as_str());
    app.set("posts.per_page", config.posts_per_page.to_string());
    app.set("posts.admin_per_page", config.admin_posts_per_page.to_string());
    crate::hooks::global_hooks(&app, auth);
    app
}
