use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use ink_axum::tenancy::is_valid_subdomain;
use ink_axum::{HostMatch, TenantResolver};
use ink_core::errors::InkError;
use ink_core::TenantContext;
use sqlx::SqliteConnection;

use super::db::{next_id, sql_id, Db};
use crate::models::Tenant;

const DEFAULT_TITLE: &str = "My Blog";
const DEFAULT_DESCRIPTION: &str = "Welcome to my blog";
const DEFAULT_THEME: &str = "default";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS tenants (
    id INTEGER PRIMARY KEY,
    subdomain TEXT NOT NULL UNIQUE,
    custom_domain TEXT UNIQUE,
    body TEXT NOT NULL
)";

/// Input for [`TenantDirectory::create`].
#[derive(Debug, Clone, Default)]
pub struct NewTenant {
    pub name: String,
    pub subdomain: String,
    pub custom_domain: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub theme: Option<String>,
}

/// Changes accepted by [`TenantDirectory::update`]. `None` leaves a field
/// alone; `custom_domain: Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct TenantChanges {
    pub name: Option<String>,
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub theme: Option<String>,
    pub is_active: Option<bool>,
    pub custom_domain: Option<Option<String>>,
}

fn normalize_domain(domain: &str) -> Option<String> {
    let d = domain.trim().trim_end_matches('.').to_ascii_lowercase();
    (!d.is_empty()).then_some(d)
}

fn decode(body: Option<String>) -> Result<Option<Tenant>> {
    body.map(|b| serde_json::from_str(&b)).transpose().map_err(Into::into)
}

/// The global tenants table.
///
/// Lookups by host only return active tenants; the admin listing returns
/// all of them.
pub struct TenantDirectory {
    db: Db,
    default_subdomain: String,
}

impl TenantDirectory {
    pub async fn open(db: Db, default_subdomain: impl Into<String>) -> Result<Self> {
        db.execute(SCHEMA).await?;
        Ok(Self {
            db,
            default_subdomain: default_subdomain.into().to_ascii_lowercase(),
        })
    }

    pub fn default_subdomain(&self) -> &str {
        &self.default_subdomain
    }

    async fn check_unique(
        conn: &mut SqliteConnection,
        skip: Option<u64>,
        subdomain: Option<&str>,
        custom_domain: Option<&str>,
    ) -> Result<()> {
        let skip = skip.map_or(0, sql_id);
        if let Some(subdomain) = subdomain {
            let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tenants WHERE subdomain = ? AND id != ?")
                .bind(subdomain)
                .bind(skip)
                .fetch_one(&mut *conn)
                .await?;
            if taken > 0 {
                return Err(InkError::conflict("Subdomain already exists").into_anyhow());
            }
        }
        if let Some(domain) = custom_domain {
            let taken: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM tenants WHERE custom_domain = ? AND id != ?")
                    .bind(domain)
                    .bind(skip)
                    .fetch_one(&mut *conn)
                    .await?;
            if taken > 0 {
                return Err(InkError::conflict("Custom domain already in use").into_anyhow());
            }
        }
        Ok(())
    }

    async fn store(conn: &mut SqliteConnection, tenant: &Tenant) -> Result<()> {
        sqlx::query(
            "INSERT INTO tenants (id, subdomain, custom_domain, body) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                subdomain = excluded.subdomain,
                custom_domain = excluded.custom_domain,
                body = excluded.body",
        )
        .bind(sql_id(tenant.id))
        .bind(&tenant.subdomain)
        .bind(tenant.custom_domain.as_deref())
        .bind(serde_json::to_string(tenant)?)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn create(&self, input: NewTenant) -> Result<Tenant> {
        let name = input.name.trim().to_string();
        let subdomain = input.subdomain.trim().to_ascii_lowercase();
        let custom_domain = input.custom_domain.as_deref().and_then(normalize_domain);

        if name.is_empty() {
            return Err(InkError::unprocessable("Tenant name is required").into_anyhow());
        }
        if !is_valid_subdomain(&subdomain) {
            return Err(InkError::unprocessable(
                "Subdomain may only contain letters, numbers, hyphens and underscores",
            )
            .into_anyhow());
        }

        let mut tx = self.db.write().await?;
        Self::check_unique(tx.conn(), None, Some(&subdomain), custom_domain.as_deref()).await?;

        let now = Utc::now();
        let id = next_id(tx.conn(), "tenants").await?;
        let tenant = Tenant {
            id,
            title: input
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            description: Some(
                input
                    .description
                    .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            ),
            theme: input
                .theme
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_THEME.to_string()),
            name,
            subdomain,
            custom_domain,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        Self::store(tx.conn(), &tenant).await?;
        tx.commit().await?;
        tracing::info!(tenant = id, subdomain = %tenant.subdomain, "tenant created");
        Ok(tenant)
    }

    pub async fn get(&self, id: u64) -> Result<Option<Tenant>> {
        let body: Option<String> = sqlx::query_scalar("SELECT body FROM tenants WHERE id = ?")
            .bind(sql_id(id))
            .fetch_optional(self.db.pool())
            .await?;
        decode(body)
    }

    /// The tenant a context was resolved for.
    pub async fn for_context(&self, ctx: &TenantContext) -> Result<Option<Tenant>> {
        match ctx.tenant_id.as_str().parse::<u64>() {
            Ok(id) => self.get(id).await,
            Err(_) => Ok(None),
        }
    }

    pub async fn by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>> {
        let body: Option<String> = sqlx::query_scalar("SELECT body FROM tenants WHERE subdomain = ?")
            .bind(subdomain.trim().to_ascii_lowercase())
            .fetch_optional(self.db.pool())
            .await?;
        decode(body)
    }

    pub async fn by_custom_domain(&self, domain: &str) -> Result<Option<Tenant>> {
        let Some(domain) = normalize_domain(domain) else {
            return Ok(None);
        };
        let body: Option<String> = sqlx::query_scalar("SELECT body FROM tenants WHERE custom_domain = ?")
            .bind(domain)
            .fetch_optional(self.db.pool())
            .await?;
        decode(body)
    }

    pub async fn list(&self) -> Result<Vec<Tenant>> {
        let bodies: Vec<String> = sqlx::query_scalar("SELECT body FROM tenants ORDER BY id")
            .fetch_all(self.db.pool())
            .await?;
        bodies
            .iter()
            .map(|b| serde_json::from_str(b).map_err(Into::into))
            .collect()
    }

    pub async fn update(&self, id: u64, changes: TenantChanges) -> Result<Tenant> {
        let mut tx = self.db.write().await?;
        let body: Option<String> = sqlx::query_scalar("SELECT body FROM tenants WHERE id = ?")
            .bind(sql_id(id))
            .fetch_optional(tx.conn())
            .await?;
        let mut next =
            decode(body)?.ok_or_else(|| InkError::not_found("Tenant not found").into_anyhow())?;

        if let Some(domain) = changes.custom_domain {
            next.custom_domain = domain.as_deref().and_then(normalize_domain);
            Self::check_unique(tx.conn(), Some(id), None, next.custom_domain.as_deref()).await?;
        }
        if let Some(name) = changes.name.filter(|n| !n.trim().is_empty()) {
            next.name = name.trim().to_string();
        }
        if let Some(title) = changes.title {
            next.title = title;
        }
        if let Some(description) = changes.description {
            next.description = description;
        }
        if let Some(theme) = changes.theme.filter(|t| !t.trim().is_empty()) {
            next.theme = theme;
        }
        if let Some(active) = changes.is_active {
            next.is_active = active;
        }
        next.updated_at = Utc::now();

        Self::store(tx.conn(), &next).await?;
        tx.commit().await?;
        Ok(next)
    }

    pub async fn remove(&self, id: u64) -> Result<Tenant> {
        let mut tx = self.db.write().await?;
        let body: Option<String> = sqlx::query_scalar("SELECT body FROM tenants WHERE id = ?")
            .bind(sql_id(id))
            .fetch_optional(tx.conn())
            .await?;
        let tenant =
            decode(body)?.ok_or_else(|| InkError::not_found("Tenant not found").into_anyhow())?;
        sqlx::query("DELETE FROM tenants WHERE id = ?")
            .bind(sql_id(id))
            .execute(tx.conn())
            .await?;
        tx.commit().await?;
        Ok(tenant)
    }
}

#[async_trait]
impl TenantResolver for TenantDirectory {
    async fn resolve(&self, host: &HostMatch) -> anyhow::Result<Option<TenantContext>> {
        let tenant = match host {
            HostMatch::Default => self.by_subdomain(&self.default_subdomain).await?,
            HostMatch::Subdomain(label) => self.by_subdomain(label).await?,
            HostMatch::CustomDomain(domain) => self.by_custom_domain(domain).await?,
            HostMatch::Invalid => None,
        };
        Ok(tenant.filter(|t| t.is_active).map(|t| t.context()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn directory() -> TenantDirectory {
        TenantDirectory::open(Db::in_memory().await.unwrap(), "main").await.unwrap()
    }

    fn new_tenant(name: &str, subdomain: &str) -> NewTenant {
        NewTenant {
            name: name.into(),
            subdomain: subdomain.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn subdomains_and_custom_domains_are_unique() {
        let dir = directory().await;
        dir.create(new_tenant("Main", "main")).await.unwrap();
        let acme = dir
            .create(NewTenant {
                custom_domain: Some("Blog.Acme.org".into()),
                ..new_tenant("Acme", "Acme")
            })
            .await
            .unwrap();
        assert_eq!(acme.subdomain, "acme");
        assert_eq!(acme.custom_domain.as_deref(), Some("blog.acme.org"));
        assert_eq!(acme.title, "My Blog");

        let dup = dir.create(new_tenant("Again", "ACME")).await.unwrap_err();
        assert_eq!(InkError::kind_of(&dup), ink_core::ErrorKind::Conflict);

        let dup_domain = dir
            .create(NewTenant {
                custom_domain: Some("blog.acme.org".into()),
                ..new_tenant("Other", "other")
            })
            .await
            .unwrap_err();
        assert_eq!(InkError::kind_of(&dup_domain), ink_core::ErrorKind::Conflict);

        let bad = dir.create(new_tenant("Bad", "no.dots")).await.unwrap_err();
        assert_eq!(InkError::kind_of(&bad), ink_core::ErrorKind::Unprocessable);
    }

    #[tokio::test]
    async fn resolves_only_active_tenants() {
        let dir = directory().await;
        let main = dir.create(new_tenant("Main", "main")).await.unwrap();
        let acme = dir
            .create(NewTenant {
                custom_domain: Some("blog.acme.org".into()),
                ..new_tenant("Acme", "acme")
            })
            .await
            .unwrap();

        let ctx = dir.resolve(&HostMatch::Default).await.unwrap().unwrap();
        assert_eq!(ctx.tenant_id, main.tenant_id());

        let by_domain = dir
            .resolve(&HostMatch::CustomDomain("blog.acme.org".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_domain.tenant_id, acme.tenant_id());
        assert_eq!(by_domain.subdomain.as_deref(), Some("acme"));

        dir.update(
            acme.id,
            TenantChanges {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(dir.resolve(&HostMatch::Subdomain("acme".into())).await.unwrap().is_none());
        assert!(dir.resolve(&HostMatch::Subdomain("nobody".into())).await.unwrap().is_none());
        assert!(dir.resolve(&HostMatch::Invalid).await.unwrap().is_none());
    }
}
