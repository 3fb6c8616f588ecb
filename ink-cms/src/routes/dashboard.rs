//! Dashboard endpoints called by the admin front-end.
//!
//! Every route here answers XHR errors (`X-Requested-With: XMLHttpRequest`)
//! as `{success: false, error}`; the upload route always does.

use axum::body::{to_bytes, Body};
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use ink_auth::AuthError;
use ink_axum::{InkAxumError, MultipartConfig, MultipartForm, UploadedFile};
use ink_media::MediaUpload;
use serde_json::{json, Value};

use crate::models::{Comment, CommentStatus, Post, PostStatus};
use crate::services::media::media_shared::record_upload;
use crate::services::CmsParams;
use crate::store::parse_id;

use super::extract::CurrentUser;
use super::AppState;

const AJAX_ERROR_BODY_LIMIT: usize = 64 * 1024;

pub fn router(state: AppState) -> Router<()> {
    let max_file = usize::try_from(state.config.media.max_file_bytes).unwrap_or(usize::MAX);
    let multipart = MultipartConfig::new()
        .max_file_size(max_file)
        .max_total_size(max_file.saturating_mul(4));

    Router::new()
        .route("/media/upload", post(upload))
        .route("/stats", get(stats))
        .route("/posts/{id}/toggle-featured", post(toggle_featured))
        .route("/comments/{id}/approve", post(approve_comment))
        .route("/comments/{id}/spam", post(mark_comment_spam))
        .layer(Extension(multipart))
        .layer(middleware::from_fn(ajax_errors))
        .with_state(state)
}

fn is_ajax(req: &Request) -> bool {
    req.headers()
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
}

/// Rewrites error bodies of XHR requests to `{success: false, error}`.
pub async fn ajax_errors(req: Request, next: Next) -> Response {
    let ajax = is_ajax(&req);
    let res = next.run(req).await;
    let status = res.status();
    if !ajax || !(status.is_client_error() || status.is_server_error()) {
        return res;
    }

    let (parts, body) = res.into_parts();
    let bytes = to_bytes(body, AJAX_ERROR_BODY_LIMIT).await.unwrap_or_default();
    let parsed: Option<Value> = serde_json::from_slice(&bytes).ok();
    if parsed.as_ref().is_some_and(|v| v.get("success").is_some()) {
        return Response::from_parts(parts, Body::from(bytes));
    }

    let message = parsed
        .as_ref()
        .and_then(|v| v.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string());
    (status, Json(json!({"success": false, "error": message}))).into_response()
}

fn upload_failure(err: InkAxumError) -> Response {
    let status = err.status();
    let message = err.to_client_error().message;
    (status, Json(json!({"success": false, "error": message}))).into_response()
}

fn as_upload(file: &UploadedFile) -> MediaUpload {
    MediaUpload {
        original_filename: file.filename.clone(),
        content_type: file.content_type.clone(),
        data: file.data.clone(),
    }
}

/// Stores the files sent as `file` (or repeated `files`). Succeeds when at
/// least one file was stored; the others are reported under `errors`.
async fn upload(
    State(st): State<AppState>,
    current: Result<CurrentUser, InkAxumError>,
    form: Result<MultipartForm, InkAxumError>,
) -> Response {
    let current = match current {
        Ok(c) => c,
        Err(e) => return upload_failure(e),
    };
    let form = match form {
        Ok(f) => f,
        Err(e) => return upload_failure(e),
    };

    let files: Vec<&UploadedFile> = form
        .files_named("file")
        .chain(form.files_named("files"))
        .filter(|f| !f.filename.trim().is_empty())
        .collect();
    if files.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "error": "No file selected"})),
        )
            .into_response();
    }

    let mut stored = Vec::new();
    let mut errors = Vec::new();
    let mut first_error = None;
    for file in files {
        match record_upload(&st.store, &st.media, &current.tenant, current.user.id, as_upload(file)).await {
            Ok(media) => stored.push(media.to_json()),
            Err(e) => {
                let e = InkAxumError::from(e);
                errors.push(format!("{}: {}", file.filename, e.to_client_error().message));
                first_error.get_or_insert(e);
            }
        }
    }

    if stored.is_empty() {
        if let Some(e) = first_error {
            return upload_failure(e);
        }
    }

    tracing::info!(
        tenant = %current.tenant.tenant_id,
        user = current.user.id,
        stored = stored.len(),
        failed = errors.len(),
        "upload handled"
    );
    Json(json!({
        "success": true,
        "message": format!("{} file(s) uploaded", stored.len()),
        "file": stored.first(),
        "files": stored,
        "errors": errors,
    }))
    .into_response()
}

/// Newest comments first, each with the title of its post.
fn recent_comments(comments: &[Comment], posts: &[Post], limit: usize) -> Vec<Value> {
    let mut newest: Vec<&Comment> = comments.iter().collect();
    newest.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    newest
        .into_iter()
        .take(limit)
        .map(|c| {
            let mut row = c.to_json(comments.iter().filter(|r| r.parent_id == Some(c.id)).count());
            row["post_title"] = posts
                .iter()
                .find(|p| p.id == c.post_id)
                .map_or(Value::Null, |p| Value::String(p.title.clone()));
            row
        })
        .collect()
}

async fn stats(State(st): State<AppState>, current: CurrentUser) -> Result<Json<Value>, InkAxumError> {
    current.principal.require_admin().map_err(AuthError::into_anyhow)?;
    let ctx = &current.tenant;
    let s = &st.store;

    let posts = s.posts.find(ctx, |_| true).await?;
    let by_status = |status: PostStatus| posts.iter().filter(|p| p.status == status).count();
    let total_views: u64 = posts.iter().map(|p| p.view_count).sum();

    let mut recent = posts.clone();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let recent: Vec<Value> = recent
        .iter()
        .take(5)
        .map(|p| json!({"id": p.id, "title": p.title, "status": p.status, "url": p.url()}))
        .collect();

    let comments = s.comments.find(ctx, |_| true).await?;
    let pending = comments.iter().filter(|c| c.status == CommentStatus::Pending).count();
    let recent_comments = recent_comments(&comments, &posts, 5);

    Ok(Json(json!({
        "success": true,
        "stats": {
            "posts": {
                "total": posts.len(),
                "published": by_status(PostStatus::Published),
                "draft": by_status(PostStatus::Draft),
                "scheduled": by_status(PostStatus::Scheduled),
            },
            "comments": {
                "total": comments.len(),
                "pending": pending,
            },
            "categories": s.categories.count(ctx, |_| true).await?,
            "tags": s.tags.count(ctx, |_| true).await?,
            "media": s.media.count(ctx, |_| true).await?,
            "users": s.users.count(ctx, |_| true).await?,
            "total_views": total_views,
            "recent_posts": recent,
            "recent_comments": recent_comments,
        },
    })))
}

async fn toggle_featured(
    State(st): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, InkAxumError> {
    current.principal.require_admin().map_err(AuthError::into_anyhow)?;
    let post = st.store.posts.require(&current.tenant, parse_id("Post", &id)?).await?;

    let updated = st
        .app
        .service("posts")?
        .patch(
            current.tenant.clone(),
            Some(&id),
            json!({"is_featured": !post.is_featured}),
            CmsParams::for_user(current.principal),
        )
        .await?;

    let featured = updated["is_featured"].as_bool().unwrap_or(false);
    Ok(Json(json!({
        "success": true,
        "is_featured": featured,
        "message": if featured { "Post featured" } else { "Post unfeatured" },
    })))
}

async fn moderate(st: &AppState, current: CurrentUser, id: &str, status: CommentStatus) -> Result<Json<Value>, InkAxumError> {
    current.principal.require_admin().map_err(AuthError::into_anyhow)?;
    let comment = st
        .app
        .service("comments")?
        .patch(
            current.tenant.clone(),
            Some(id),
            json!({"status": status}),
            CmsParams::for_user(current.principal),
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "status": comment["status"],
        "comment_id": comment["id"],
    })))
}

async fn approve_comment(
    State(st): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, InkAxumError> {
    moderate(&st, current, &id, CommentStatus::Approved).await
}

async fn mark_comment_spam(
    State(st): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, InkAxumError> {
    moderate(&st, current, &id, CommentStatus::Spam).await
}
