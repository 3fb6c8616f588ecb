use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ink_core::errors::InkError;
use ink_core::{InkService, ServiceCapabilities, TenantContext};
use serde_json::{json, Value};

use crate::models::Category;
use crate::services::shared::{paginate, query_id, require_id, MAX_PER_PAGE};
use crate::services::CmsParams;
use crate::store::{parse_id, CmsState, Rows};
use crate::text::{slugify, unique_slug, CATEGORY_SLUG_MAX};
use crate::validate::{clean, validate};

use super::categories_schema::{CategoryChanges, CreateCategory, PatchCategory, ERROR_MESSAGE};
use super::categories_shared;

pub struct CategoriesService {
    state: Arc<CmsState>,
}

impl CategoriesService {
    pub fn new(state: Arc<CmsState>) -> Self {
        Self { state }
    }
}

fn invalid(field: &str, message: &str) -> anyhow::Error {
    InkError::unprocessable(ERROR_MESSAGE)
        .with_errors(json!({ field: [message] }))
        .into_anyhow()
}

/// `parent` must be another category of the tenant and must not have
/// `id` among its ancestors.
fn check_parent(id: u64, parent: u64, rows: &Rows<Category>) -> Result<()> {
    let mut cursor = Some(parent);
    let mut hops = 0;
    while let Some(current) = cursor {
        if current == id || hops > rows.len() {
            return Err(invalid("parent_id", "would create a cycle"));
        }
        let Some(row) = rows.get(&current) else {
            return Err(invalid("parent_id", "Category not found"));
        };
        cursor = row.parent_id;
        hops += 1;
    }
    Ok(())
}

fn apply(category: &mut Category, changes: CategoryChanges, rows: &Rows<Category>, now: DateTime<Utc>) -> Result<()> {
    if let Some(name) = changes.name {
        category.name = name.trim().to_string();
    }

    let requested = changes.slug.as_deref().map(str::trim).filter(|s| !s.is_empty());
    if requested.is_some() || category.slug.is_empty() {
        let mut base = slugify(requested.unwrap_or(&category.name), CATEGORY_SLUG_MAX);
        if base.is_empty() {
            base = "category".to_string();
        }
        category.slug = unique_slug(&base, |s| rows.values().any(|c| c.slug == s));
    }

    if let Some(description) = changes.description {
        category.description = clean(description);
    }
    if let Some(color) = changes.color.and_then(|c| clean(Some(c))) {
        category.color = color;
    }
    if let Some(order) = changes.sort_order {
        category.sort_order = order;
    }
    if let Some(parent) = changes.parent_id {
        if let Some(parent) = parent {
            check_parent(category.id, parent, rows)?;
        }
        category.parent_id = parent;
    }
    if let Some(active) = changes.is_active {
        category.is_active = active;
    }
    category.updated_at = now;
    Ok(())
}

impl CategoriesService {
    async fn write(&self, ctx: &TenantContext, id: u64, changes: CategoryChanges) -> Result<Value> {
        let category = self
            .state
            .categories
            .update_with(ctx, id, |c, rows| apply(c, changes, rows, Utc::now()))
            .await?;
        Ok(category.to_json())
    }
}

#[async_trait]
impl InkService<Value, CmsParams> for CategoriesService {
    fn capabilities(&self) -> ServiceCapabilities {
        categories_shared::crud_capabilities()
    }

    /// Ordered by `sort_order`, then name. `?active=` and `?parent=` filter.
    async fn find(&self, ctx: &TenantContext, params: CmsParams) -> Result<Vec<Value>> {
        params.caller()?;
        let active = params.query_bool("active");
        let parent = query_id(&params, "parent")?;

        let mut categories = self
            .state
            .categories
            .find(ctx, |c| {
                active.map_or(true, |a| c.is_active == a) && parent.map_or(true, |p| c.parent_id == Some(p))
            })
            .await?;
        categories.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });

        Ok(paginate(categories, &params, MAX_PER_PAGE)
            .iter()
            .map(|c| c.to_json())
            .collect())
    }

    async fn get(&self, ctx: &TenantContext, id: &str, params: CmsParams) -> Result<Value> {
        params.caller()?;
        let id = parse_id("Category", id)?;
        Ok(self.state.categories.require(ctx, id).await?.to_json())
    }

    async fn create(&self, ctx: &TenantContext, data: Value, _params: CmsParams) -> Result<Value> {
        let input: CreateCategory = validate(&data, ERROR_MESSAGE)?;
        let changes = CategoryChanges::from(input);
        let now = Utc::now();

        let category = self
            .state
            .categories
            .insert_with(ctx, |id, rows| {
                let mut category = Category {
                    id,
                    tenant_id: ctx.tenant_id.clone(),
                    parent_id: None,
                    name: String::new(),
                    slug: String::new(),
                    description: None,
                    color: String::new(),
                    sort_order: 0,
                    is_active: true,
                    created_at: now,
                    updated_at: now,
                };
                apply(&mut category, changes, rows, now)?;
                Ok(category)
            })
            .await?;

        tracing::info!(tenant = %ctx.tenant_id, category = category.id, slug = %category.slug, "category created");
        Ok(category.to_json())
    }

    async fn update(&self, ctx: &TenantContext, id: &str, data: Value, _params: CmsParams) -> Result<Value> {
        let id = parse_id("Category", id)?;
        let input: CreateCategory = validate(&data, ERROR_MESSAGE)?;
        self.write(ctx, id, input.into()).await
    }

    async fn patch(&self, ctx: &TenantContext, id: Option<&str>, data: Value, _params: CmsParams) -> Result<Value> {
        let id = parse_id("Category", require_id("Category", id)?)?;
        let input: PatchCategory = validate(&data, ERROR_MESSAGE)?;
        self.write(ctx, id, input.into()).await
    }

    /// Posts lose the category; child categories move to the top level.
    async fn remove(&self, ctx: &TenantContext, id: Option<&str>, _params: CmsParams) -> Result<Value> {
        let id = parse_id("Category", require_id("Category", id)?)?;
        let category = self.state.categories.remove(ctx, id).await?;

        let detached = self
            .state
            .posts
            .update_all(ctx, |post| {
                let hit = post.category_id == Some(id);
                if hit {
                    post.category_id = None;
                }
                hit
            })
            .await?;
        self.state
            .categories
            .update_all(ctx, |child| {
                let hit = child.parent_id == Some(id);
                if hit {
                    child.parent_id = None;
                }
                hit
            })
            .await?;

        tracing::info!(tenant = %ctx.tenant_id, category = id, detached, "category removed");
        Ok(category.to_json())
    }
}
