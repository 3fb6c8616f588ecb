use chrono::{DateTime, Utc};
use ink_core::{TenantContext, TenantId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::ts;

/// One blog/site. Tenants are not themselves tenant-scoped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: u64,
    pub name: String,
    pub subdomain: String,
    pub custom_domain: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub theme: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub fn tenant_id(&self) -> TenantId {
        TenantId(self.id.to_string())
    }

    /// The context requests addressed to this tenant run with.
    pub fn context(&self) -> TenantContext {
        TenantContext::new(self.id.to_string()).with_subdomain(self.subdomain.clone())
    }

    /// Custom domain when set, else `subdomain.main_domain`.
    pub fn full_domain(&self, main_domain: &str) -> String {
        match &self.custom_domain {
            Some(domain) => domain.clone(),
            None => format!("{}.{}", self.subdomain, main_domain),
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "subdomain": self.subdomain,
            "custom_domain": self.custom_domain,
            "title": self.title,
            "description": self.description,
            "theme": self.theme,
            "is_active": self.is_active,
            "created_at": ts(&self.created_at),
            "updated_at": ts(&self.updated_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant(custom: Option<&str>) -> Tenant {
        let now = Utc::now();
        Tenant {
            id: 4,
            name: "Acme".into(),
            subdomain: "acme".into(),
            custom_domain: custom.map(str::to_string),
            title: "Acme Blog".into(),
            description: None,
            theme: "default".into(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn domains_prefer_the_custom_one() {
        assert_eq!(tenant(None).full_domain("inkwell.blog"), "acme.inkwell.blog");
        assert_eq!(tenant(Some("blog.acme.org")).full_domain("inkwell.blog"), "blog.acme.org");
    }

    #[test]
    fn context_carries_id_and_subdomain() {
        let ctx = tenant(None).context();
        assert_eq!(ctx.tenant_id.as_str(), "4");
        assert_eq!(ctx.subdomain.as_deref(), Some("acme"));
    }
}
