use std::sync::Arc;

use ink_core::{InkApp, ServiceCapabilities, ServiceMethodKind};
use serde_json::Value;

use crate::hooks::RequireSuperAdmin;
use crate::services::CmsParams;
use crate::validate::FieldErrors;

use super::tenants_schema::CreateTenant;

pub fn capabilities() -> ServiceCapabilities {
    ServiceCapabilities::from_methods(vec![
        ServiceMethodKind::Find,
        ServiceMethodKind::Get,
        ServiceMethodKind::Create,
        ServiceMethodKind::Patch,
        ServiceMethodKind::Remove,
    ])
}

pub fn register_hooks(app: &InkApp<Value, CmsParams>) -> anyhow::Result<()> {
    app.service("tenants")?.hooks(|h| {
        h.before_all(Arc::new(RequireSuperAdmin));
    });
    Ok(())
}

/// Checks on the first admin account that the schema can't express.
pub fn check_admin_fields(input: &CreateTenant, min_password: usize, errors: &mut FieldErrors) {
    if !input.admin_email.contains('@') {
        errors.push("admin_email", "Valid admin email is required");
    }
    if input.admin_username.trim().is_empty() {
        errors.push("admin_username", "Admin username is required");
    }
    if input.admin_password.chars().count() < min_password {
        errors.push(
            "admin_password",
            format!("Admin password must be at least {min_password} characters long"),
        );
    }
}
