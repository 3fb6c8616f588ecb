use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use ink_core::errors::InkError;
use ink_core::{ErrorKind, InkApp, ServiceCapabilities, ServiceMethodKind, TenantContext};
use serde_json::Value;

use crate::hooks::RequireAdmin;
use crate::models::Tag;
use crate::services::CmsParams;
use crate::store::CmsState;
use crate::text::{slugify, TAG_SLUG_MAX};

use super::tags_schema::DEFAULT_COLOR;

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
    app.service("tags")?.hooks(|h| {
        h.before_patch(Arc::new(RequireAdmin));
        h.before_remove(Arc::new(RequireAdmin));
    });
    Ok(())
}

pub(crate) fn new_tag(
    ctx: &TenantContext,
    id: u64,
    name: &str,
    slug: String,
    now: DateTime<Utc>,
) -> Tag {
    Tag {
        id,
        tenant_id: ctx.tenant_id.clone(),
        name: name.trim().to_string(),
        slug,
        description: None,
        color: DEFAULT_COLOR.to_string(),
        use_count: 0,
        created_at: now,
        updated_at: now,
    }
}

fn same_tag(tag: &Tag, name: &str, slug: &str) -> bool {
    tag.slug == slug || tag.name.eq_ignore_ascii_case(name)
}

/// Ids of the tags named `names`, creating the missing ones.
///
/// Names are matched on slug or case-insensitively on name; names that
/// slugify to nothing are skipped.
pub async fn resolve_tag_names(state: &CmsState, ctx: &TenantContext, names: &[String]) -> Result<Vec<u64>> {
    let mut ids = Vec::with_capacity(names.len());

    for name in names {
        let name = name.trim();
        let slug = slugify(name, TAG_SLUG_MAX);
        if slug.is_empty() {
            continue;
        }

        if let Some(tag) = state.tags.find_one(ctx, |t| same_tag(t, name, &slug)).await? {
            ids.push(tag.id);
            continue;
        }

        let created = state
            .tags
            .insert_with(ctx, |id, rows| {
                if rows.values().any(|t| same_tag(t, name, &slug)) {
                    return Err(InkError::conflict("Tag already exists").into_anyhow());
                }
                Ok(new_tag(ctx, id, name, slug.clone(), Utc::now()))
            })
            .await;

        let tag = match created {
            Ok(tag) => tag,
            // Created by a concurrent request between lookup and insert.
            Err(e) if InkError::kind_of(&e) == ErrorKind::Conflict => state
                .tags
                .find_one(ctx, |t| same_tag(t, name, &slug))
                .await?
                .ok_or(e)?,
            Err(e) => return Err(e),
        };
        if !ids.contains(&tag.id) {
            ids.push(tag.id);
        }
    }

    Ok(ids)
}

/// Recount how many posts carry each of `tag_ids`.
pub async fn refresh_use_counts<I>(state: &CmsState, ctx: &TenantContext, tag_ids: I) -> Result<()>
where
    I: IntoIterator<Item = u64>,
{
    let ids: BTreeSet<u64> = tag_ids.into_iter().collect();
    for id in ids {
        let count = state.posts.count(ctx, |p| p.tag_ids.contains(&id)).await? as u64;
        let res = state
            .tags
            .update_with(ctx, id, |tag, _| {
                tag.use_count = count;
                Ok(())
            })
            .await;
        match res {
            Err(e) if InkError::kind_of(&e) == ErrorKind::NotFound => {
                tracing::debug!(tag = id, "tag gone before recount");
            }
            other => {
                other?;
            }
        }
    }
    Ok(())
}
