//! SQLite content store, partitioned by tenant.

mod db;
mod directory;
mod table;

pub use db::{is_memory_url, is_supported_url, Db};
pub use directory::{NewTenant, TenantChanges, TenantDirectory};
pub use table::{parse_id, Rows, TenantScoped, TenantTable};

use anyhow::Result;
use async_trait::async_trait;
use ink_axum::{HostMatch, TenantResolver};
use ink_core::{TenantContext, TenantId};

use crate::models::{Category, Comment, MediaFile, Post, Setting, Tag, User};

/// All tables of the CMS.
pub struct CmsState {
    pub tenants: TenantDirectory,
    pub users: TenantTable<User>,
    pub posts: TenantTable<Post>,
    pub categories: TenantTable<Category>,
    pub tags: TenantTable<Tag>,
    pub media: TenantTable<MediaFile>,
    pub settings: TenantTable<Setting>,
    pub comments: TenantTable<Comment>,
}

impl CmsState {
    /// Open (and create when missing) every table in `db`.
    pub async fn open(db: Db, default_subdomain: &str) -> Result<Self> {
        Ok(Self {
            tenants: TenantDirectory::open(db.clone(), default_subdomain).await?,
            users: TenantTable::open(db.clone(), "users", "User").await?,
            posts: TenantTable::open(db.clone(), "posts", "Post").await?,
            categories: TenantTable::open(db.clone(), "categories", "Category").await?,
            tags: TenantTable::open(db.clone(), "tags", "Tag").await?,
            media: TenantTable::open(db.clone(), "media_files", "Media file").await?,
            settings: TenantTable::open(db.clone(), "settings", "Setting").await?,
            comments: TenantTable::open(db, "comments", "Comment").await?,
        })
    }

    pub async fn connect(database_url: &str, default_subdomain: &str) -> Result<Self> {
        Self::open(Db::connect(database_url).await?, default_subdomain).await
    }

    /// A private in-memory database.
    pub async fn in_memory(default_subdomain: &str) -> Result<Self> {
        Self::open(Db::in_memory().await?, default_subdomain).await
    }

    /// Drop every row a tenant owns. Blobs are removed by the caller.
    pub async fn purge_tenant(&self, tenant_id: &TenantId) -> Result<usize> {
        Ok(self.comments.clear_tenant(tenant_id).await?
            + self.users.clear_tenant(tenant_id).await?
            + self.posts.clear_tenant(tenant_id).await?
            + self.categories.clear_tenant(tenant_id).await?
            + self.tags.clear_tenant(tenant_id).await?
            + self.media.clear_tenant(tenant_id).await?
            + self.settings.clear_tenant(tenant_id).await?)
    }
}

#[async_trait]
impl TenantResolver for CmsState {
    async fn resolve(&self, host: &HostMatch) -> anyhow::Result<Option<TenantContext>> {
        self.tenants.resolve(host).await
    }
}
