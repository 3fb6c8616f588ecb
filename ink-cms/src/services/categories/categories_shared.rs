use std::sync::Arc;

use ink_core::InkApp;
use serde_json::Value;

use crate::hooks::RequireAdmin;
use crate::services::CmsParams;

pub use crate::services::shared::crud_capabilities;

/// Reading is open to any signed-in user; writing is for admins.
pub fn register_hooks(app: &InkApp<Value, CmsParams>) -> anyhow::Result<()> {
    app.service("categories")?.hooks(|h| {
        h.before_create(Arc::new(RequireAdmin));
        h.before_update(Arc::new(RequireAdmin));
        h.before_patch(Arc::new(RequireAdmin));
        h.before_remove(Arc::new(RequireAdmin));
    });
    Ok(())
}
