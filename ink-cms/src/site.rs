//! Read side of the public site: published posts and the page data the
//! templates render.

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use ink_core::TenantContext;
use serde_json::{json, Value};

use crate::models::{Post, Tenant};
use crate::services::settings::settings_shared::public_settings;
use crate::store::CmsState;
use crate::text::excerpt_with_len;

pub const SEARCH_MIN_CHARS: usize = 2;
pub const SEARCH_LIMIT: usize = 10;
const SEARCH_EXCERPT_LEN: usize = 150;
const RELATED_LIMIT: usize = 3;
const FEATURED_LIMIT: usize = 5;

/// Site-wide template data: the tenant's title, description, theme and
/// public settings.
pub async fn site_json(store: &CmsState, ctx: &TenantContext) -> Result<Value> {
    let tenant = store.tenants.for_context(ctx).await?;
    let settings = public_settings(store, ctx).await?;
    Ok(match tenant {
        Some(Tenant { title, description, theme, .. }) => json!({
            "title": title,
            "description": description,
            "theme": theme,
            "settings": settings,
        }),
        None => json!({"title": "", "theme": "default", "settings": settings}),
    })
}

/// Published posts matching `pred`, newest first.
pub async fn published_posts<F>(store: &CmsState, ctx: &TenantContext, pred: F) -> Result<Vec<Post>>
where
    F: Fn(&Post) -> bool,
{
    let now = Utc::now();
    let mut posts = store
        .posts
        .find(ctx, |p| p.is_published_at(now) && pred(p))
        .await?;
    sort_newest_first(&mut posts);
    Ok(posts)
}

fn sort_newest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| {
        b.published_at
            .cmp(&a.published_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

fn display_date(at: &DateTime<Utc>) -> String {
    at.format("%B %d, %Y").to_string()
}

/// Post JSON with its author, category and tags filled in for templates.
pub async fn post_cards(store: &CmsState, ctx: &TenantContext, posts: &[Post]) -> Result<Vec<Value>> {
    let authors: HashMap<u64, Value> = store
        .users
        .find(ctx, |_| true)
        .await?
        .into_iter()
        .map(|u| (u.id, json!({"full_name": display_name(&u.full_name(), &u.username), "username": u.username})))
        .collect();
    let categories: HashMap<u64, Value> = store
        .categories
        .find(ctx, |_| true)
        .await?
        .into_iter()
        .map(|c| (c.id, json!({"name": c.name, "url": c.url(), "slug": c.slug})))
        .collect();
    let tags: HashMap<u64, Value> = store
        .tags
        .find(ctx, |_| true)
        .await?
        .into_iter()
        .map(|t| (t.id, json!({"name": t.name, "url": t.url(), "slug": t.slug})))
        .collect();

    Ok(posts
        .iter()
        .map(|p| {
            let mut card = p.to_json();
            card["author"] = authors.get(&p.author_id).cloned().unwrap_or(Value::Null);
            card["category"] = p
                .category_id
                .and_then(|id| categories.get(&id).cloned())
                .unwrap_or(Value::Null);
            card["tags"] = Value::Array(p.tag_ids.iter().filter_map(|id| tags.get(id).cloned()).collect());
            card["published_date"] = p
                .published_at
                .as_ref()
                .map_or(Value::Null, |at| Value::String(display_date(at)));
            card
        })
        .collect())
}

fn display_name(full_name: &str, username: &str) -> String {
    if full_name.is_empty() {
        username.to_string()
    } else {
        full_name.to_string()
    }
}

/// One page of `items` and the pager data for it. Pages are 1-based.
pub fn page_of<T>(items: Vec<T>, page: usize, per_page: usize) -> (Vec<T>, Value) {
    let per_page = per_page.max(1);
    let total = items.len();
    let pages = total.div_ceil(per_page);
    let page = page.max(1);

    let slice = items
        .into_iter()
        .skip((page - 1).saturating_mul(per_page))
        .take(per_page)
        .collect();
    let pager = json!({
        "page": page,
        "per_page": per_page,
        "total": total,
        "pages": pages,
        "prev": (page > 1).then(|| page - 1),
        "next": (page < pages).then(|| page + 1),
    });
    (slice, pager)
}

/// Up to three other published posts of the same category.
pub async fn related_posts(store: &CmsState, ctx: &TenantContext, post: &Post) -> Result<Vec<Post>> {
    let Some(category) = post.category_id else {
        return Ok(Vec::new());
    };
    let mut related = published_posts(store, ctx, |p| p.category_id == Some(category) && p.id != post.id).await?;
    related.truncate(RELATED_LIMIT);
    Ok(related)
}

pub async fn featured_posts(store: &CmsState, ctx: &TenantContext) -> Result<Vec<Post>> {
    let mut featured = published_posts(store, ctx, |p| p.is_featured).await?;
    featured.truncate(FEATURED_LIMIT);
    Ok(featured)
}

/// Active categories with their number of published posts.
pub async fn category_links(store: &CmsState, ctx: &TenantContext) -> Result<Vec<Value>> {
    let posts = published_posts(store, ctx, |p| p.category_id.is_some()).await?;
    let mut categories = store.categories.find(ctx, |c| c.is_active).await?;
    categories.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(&b.name)));

    Ok(categories
        .iter()
        .map(|c| {
            let count = posts.iter().filter(|p| p.category_id == Some(c.id)).count();
            json!({"name": c.name, "url": c.url(), "post_count": count})
        })
        .collect())
}

/// Year/month buckets of published posts, newest first.
pub fn archive_months(posts: &[Post]) -> Vec<Value> {
    let mut buckets: BTreeMap<(i32, u32), usize> = BTreeMap::new();
    for at in posts.iter().filter_map(|p| p.published_at) {
        *buckets.entry((at.year(), at.month())).or_default() += 1;
    }

    buckets
        .into_iter()
        .rev()
        .map(|((year, month), count)| {
            let label = NaiveDate::from_ymd_opt(year, month, 1)
                .map(|d| d.format("%B %Y").to_string())
                .unwrap_or_else(|| format!("{year}-{month:02}"));
            json!({"year": year, "month": month, "label": label, "count": count})
        })
        .collect()
}

pub fn in_month(post: &Post, year: i32, month: u32) -> bool {
    post.published_at
        .is_some_and(|at| at.year() == year && at.month() == month)
}

/// Approved comments of a post, oldest first.
pub async fn approved_comments(store: &CmsState, ctx: &TenantContext, post_id: u64) -> Result<Vec<Value>> {
    let mut comments = store
        .comments
        .find(ctx, |c| c.post_id == post_id && c.is_approved())
        .await?;
    comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    Ok(comments
        .iter()
        .map(|c| {
            let mut row = c.to_json(comments.iter().filter(|r| r.parent_id == Some(c.id)).count());
            row["created_date"] = Value::String(display_date(&c.created_at));
            row
        })
        .collect())
}

/// Live search over published posts; queries shorter than two characters
/// match nothing.
pub async fn live_search(store: &CmsState, ctx: &TenantContext, query: &str) -> Result<Vec<Value>> {
    let query = query.trim();
    if query.chars().count() < SEARCH_MIN_CHARS {
        return Ok(Vec::new());
    }

    let needle = query.to_lowercase();
    let mut hits = published_posts(store, ctx, |p| p.matches_text(&needle)).await?;
    hits.truncate(SEARCH_LIMIT);

    Ok(hits
        .iter()
        .map(|p| {
            json!({
                "title": p.title,
                "excerpt": excerpt_with_len(&p.summary(), SEARCH_EXCERPT_LEN),
                "url": p.url(),
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use ink_core::TenantId;

    use super::*;
    use crate::models::PostStatus;

    fn post(id: u64, title: &str, published: Option<DateTime<Utc>>) -> Post {
        let now = Utc::now();
        Post {
            id,
            tenant_id: TenantId::from("1"),
            author_id: 1,
            category_id: None,
            title: title.into(),
            slug: format!("post-{id}"),
            excerpt: None,
            content: format!("<p>About {title}</p>"),
            meta_title: None,
            meta_description: None,
            meta_keywords: None,
            featured_image_url: None,
            featured_image_alt: None,
            status: if published.is_some() { PostStatus::Published } else { PostStatus::Draft },
            is_featured: false,
            allow_comments: true,
            published_at: published,
            scheduled_at: None,
            view_count: 0,
            tag_ids: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    async fn seeded() -> (CmsState, TenantContext) {
        let store = CmsState::in_memory("main").await.unwrap();
        let ctx = TenantContext::new("1");
        let now = Utc::now();
        for p in [
            post(0, "Rust ownership", Some(now - Duration::days(2))),
            post(0, "Rust traits", Some(now - Duration::days(1))),
            post(0, "Rust drafts", None),
            post(0, "Later rust", Some(now + Duration::days(1))),
        ] {
            store
                .posts
                .insert_with(&ctx, |id, _| Ok(Post { id, ..p }))
                .await
                .unwrap();
        }
        (store, ctx)
    }

    #[tokio::test]
    async fn search_needs_two_characters_and_sees_only_published_posts() {
        let (store, ctx) = seeded().await;
        assert!(live_search(&store, &ctx, " r ").await.unwrap().is_empty());

        let hits = live_search(&store, &ctx, "RUST").await.unwrap();
        let titles: Vec<_> = hits.iter().map(|h| h["title"].as_str().unwrap()).collect();
        assert_eq!(titles, ["Rust traits", "Rust ownership"]);
        assert!(hits[0]["url"].as_str().unwrap().starts_with("/post/"));

        assert!(live_search(&store, &TenantContext::new("2"), "rust").await.unwrap().is_empty());
    }

    #[test]
    fn pages_report_neighbours() {
        let (items, pager) = page_of((1..=25).collect::<Vec<_>>(), 2, 10);
        assert_eq!(items, (11..=20).collect::<Vec<_>>());
        assert_eq!(pager["pages"], 3);
        assert_eq!(pager["prev"], 1);
        assert_eq!(pager["next"], 3);

        let (_, last) = page_of((1..=25).collect::<Vec<_>>(), 3, 10);
        assert!(last["next"].is_null());
    }

    #[test]
    fn archive_buckets_by_month() {
        let at = |y, m, d| Some(Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap());
        let posts = [
            post(1, "a", at(2024, 1, 3)),
            post(2, "b", at(2024, 1, 20)),
            post(3, "c", at(2024, 3, 1)),
        ];
        let months = archive_months(&posts);
        assert_eq!(months.len(), 2);
        assert_eq!(months[0]["label"], "March 2024");
        assert_eq!(months[1]["count"], 2);
        assert!(in_month(&posts[0], 2024, 1));
    }
}
