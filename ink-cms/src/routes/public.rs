//! The rendered public site, live search, uploaded files and health.

use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use ink_axum::{InkAxumError, Tenant};
use ink_core::errors::InkError;
use ink_core::TenantContext;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::services::CmsParams;
use crate::site;

use super::extract::JsonBody;
use super::AppState;

type PageResult = Result<Response, InkAxumError>;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

pub fn router(state: AppState) -> Router<()> {
    Router::new()
        .route("/", get(index))
        .route("/post/{slug}", get(show_post))
        .route("/post/{slug}/comments", post(post_comment))
        .route("/category/{slug}", get(category))
        .route("/tag/{slug}", get(tag))
        .route("/archive", get(archive))
        .route("/archive/{year}/{month}", get(archive_month))
        .route("/search", get(search))
        .route("/uploads/{*key}", get(uploaded_file))
        .with_state(state)
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "service": "inkwell",
    }))
}

async fn page(st: &AppState, ctx: &TenantContext, template: &str, mut data: Value) -> PageResult {
    data["site"] = site::site_json(&st.store, ctx).await?;
    let html = st.renderer.render(template, &data)?;
    Ok(Html(html).into_response())
}

async fn not_found(st: &AppState, ctx: &TenantContext, message: &str) -> PageResult {
    let res = page(st, ctx, "not_found", json!({"page_title": "Not found", "message": message})).await?;
    Ok((StatusCode::NOT_FOUND, res).into_response())
}

async fn index(State(st): State<AppState>, Tenant(ctx): Tenant, Query(q): Query<PageQuery>) -> PageResult {
    let posts = site::published_posts(&st.store, &ctx, |_| true).await?;
    let (posts, pagination) = site::page_of(posts, q.page.unwrap_or(1), st.config.posts_per_page);
    let featured = site::featured_posts(&st.store, &ctx).await?;

    let data = json!({
        "posts": site::post_cards(&st.store, &ctx, &posts).await?,
        "featured": site::post_cards(&st.store, &ctx, &featured).await?,
        "categories": site::category_links(&st.store, &ctx).await?,
        "pagination": pagination,
    });
    page(&st, &ctx, "index", data).await
}

/// Counts a view on every hit.
async fn show_post(State(st): State<AppState>, Tenant(ctx): Tenant, Path(slug): Path<String>) -> PageResult {
    let now = Utc::now();
    let Some(post) = st
        .store
        .posts
        .find_one(&ctx, |p| p.slug == slug && p.is_published_at(now))
        .await?
    else {
        return not_found(&st, &ctx, "That post doesn't exist or isn't published yet.").await;
    };

    let post = st
        .store
        .posts
        .update_with(&ctx, post.id, |p, _| {
            p.view_count += 1;
            Ok(())
        })
        .await?;
    let related = site::related_posts(&st.store, &ctx, &post).await?;

    let card = site::post_cards(&st.store, &ctx, std::slice::from_ref(&post))
        .await?
        .into_iter()
        .next()
        .unwrap_or(Value::Null);
    let data = json!({
        "page_title": post.meta_title.clone().unwrap_or_else(|| post.title.clone()),
        "meta_description": post.meta_description.clone().unwrap_or_else(|| post.summary()),
        "post": card,
        "related": site::post_cards(&st.store, &ctx, &related).await?,
        "comments": site::approved_comments(&st.store, &ctx, post.id).await?,
    });
    page(&st, &ctx, "post", data).await
}

/// Fields a guest may fill in on the comment form.
const COMMENT_FIELDS: &[&str] = &["content", "parent_id", "author_name", "author_email", "author_website"];

/// First hop of `X-Forwarded-For`, else `X-Real-IP`.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next());
    forwarded
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

/// The guest comment form. Comments wait for moderation.
async fn post_comment(
    State(st): State<AppState>,
    Tenant(ctx): Tenant,
    Path(slug): Path<String>,
    headers: HeaderMap,
    JsonBody(form): JsonBody<Map<String, Value>>,
) -> Result<Response, InkAxumError> {
    let now = Utc::now();
    let post = st
        .store
        .posts
        .find_one(&ctx, |p| p.slug == slug && p.is_published_at(now))
        .await?
        .ok_or_else(|| InkError::not_found("Post not found"))?;

    let mut data: Map<String, Value> = form
        .into_iter()
        .filter(|(k, _)| COMMENT_FIELDS.contains(&k.as_str()))
        .collect();
    data.insert("post_id".into(), json!(post.id));
    if let Some(ip) = client_ip(&headers) {
        data.insert("author_ip".into(), Value::String(ip));
    }

    let created = st
        .app
        .service("comments")?
        .create(ctx.clone(), Value::Object(data), CmsParams::system())
        .await?;
    let comment = json!({
        "id": created["id"],
        "post_id": created["post_id"],
        "parent_id": created["parent_id"],
        "content": created["content"],
        "author_name": created["author_name"],
        "status": created["status"],
        "created_at": created["created_at"],
    });

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Thanks! Your comment is awaiting moderation.",
            "comment": comment,
        })),
    )
        .into_response())
}

async fn category(
    State(st): State<AppState>,
    Tenant(ctx): Tenant,
    Path(slug): Path<String>,
    Query(q): Query<PageQuery>,
) -> PageResult {
    let Some(category) = st
        .store
        .categories
        .find_one(&ctx, |c| c.slug == slug && c.is_active)
        .await?
    else {
        return not_found(&st, &ctx, "No such category.").await;
    };

    let posts = site::published_posts(&st.store, &ctx, |p| p.category_id == Some(category.id)).await?;
    let (posts, pagination) = site::page_of(posts, q.page.unwrap_or(1), st.config.posts_per_page);
    let data = json!({
        "page_title": category.name,
        "heading": category.name,
        "description": category.description,
        "posts": site::post_cards(&st.store, &ctx, &posts).await?,
        "pagination": pagination,
    });
    page(&st, &ctx, "listing", data).await
}

async fn tag(
    State(st): State<AppState>,
    Tenant(ctx): Tenant,
    Path(slug): Path<String>,
    Query(q): Query<PageQuery>,
) -> PageResult {
    let Some(tag) = st.store.tags.find_one(&ctx, |t| t.slug == slug).await? else {
        return not_found(&st, &ctx, "No such tag.").await;
    };

    let posts = site::published_posts(&st.store, &ctx, |p| p.tag_ids.contains(&tag.id)).await?;
    let (posts, pagination) = site::page_of(posts, q.page.unwrap_or(1), st.config.posts_per_page);
    let data = json!({
        "page_title": format!("#{}", tag.name),
        "heading": format!("Posts tagged #{}", tag.name),
        "description": tag.description,
        "posts": site::post_cards(&st.store, &ctx, &posts).await?,
        "pagination": pagination,
    });
    page(&st, &ctx, "listing", data).await
}

async fn archive(State(st): State<AppState>, Tenant(ctx): Tenant) -> PageResult {
    let posts = site::published_posts(&st.store, &ctx, |_| true).await?;
    let data = json!({
        "page_title": "Archive",
        "months": site::archive_months(&posts),
    });
    page(&st, &ctx, "archive", data).await
}

async fn archive_month(
    State(st): State<AppState>,
    Tenant(ctx): Tenant,
    Path((year, month)): Path<(i32, u32)>,
    Query(q): Query<PageQuery>,
) -> PageResult {
    if !(1..=12).contains(&month) {
        return not_found(&st, &ctx, "No such month.").await;
    }

    let posts = site::published_posts(&st.store, &ctx, |p| site::in_month(p, year, month)).await?;
    let (posts, pagination) = site::page_of(posts, q.page.unwrap_or(1), st.config.posts_per_page);
    let heading = format!("Archive for {year}-{month:02}");
    let data = json!({
        "page_title": heading,
        "heading": heading,
        "posts": site::post_cards(&st.store, &ctx, &posts).await?,
        "pagination": pagination,
    });
    page(&st, &ctx, "listing", data).await
}

async fn search(
    State(st): State<AppState>,
    Tenant(ctx): Tenant,
    Query(q): Query<SearchQuery>,
) -> Result<Json<Value>, InkAxumError> {
    let query = q.q.unwrap_or_default();
    let results = site::live_search(&st.store, &ctx, &query).await?;
    Ok(Json(json!({"results": results})))
}

/// Serves a blob, but only from the requesting tenant's own key space.
async fn uploaded_file(State(st): State<AppState>, Tenant(ctx): Tenant, Path(key): Path<String>) -> PageResult {
    let own_prefix = format!("{}/", ctx.tenant_id);
    if !key.starts_with(&own_prefix) || key.split('/').any(|seg| seg == "..") {
        return Err(ink_core::errors::InkError::not_found("File not found").into());
    }

    let blob = st
        .media
        .open(&key)
        .await
        .map_err(ink_media::MediaError::into_anyhow)?;
    let content_type = blob
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());
    Ok(([(CONTENT_TYPE, content_type)], blob.data).into_response())
}
