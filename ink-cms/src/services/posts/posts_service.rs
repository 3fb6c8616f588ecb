use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ink_core::errors::InkError;
use ink_core::{InkService, ServiceCapabilities, TenantContext};
use serde_json::{json, Value};

use crate::models::{Post, PostStatus};
use crate::services::comments::comments_shared::remove_post_comments;
use crate::services::shared::{paginate, query_id, require_id};
use crate::services::tags::tags_shared::{refresh_use_counts, resolve_tag_names};
use crate::services::{Caller, CmsParams};
use crate::store::{parse_id, CmsState, Rows};
use crate::text::{slugify, unique_slug, POST_SLUG_MAX};
use crate::validate::validate;

use super::posts_schema::{CreatePost, PatchPost, PostChanges, ERROR_MESSAGE};
use super::posts_shared;

pub struct PostsService {
    state: Arc<CmsState>,
    per_page: usize,
}

impl PostsService {
    pub fn new(state: Arc<CmsState>, per_page: usize) -> Self {
        Self { state, per_page }
    }
}

/// Editors see published posts and their own; admins see everything.
fn visible_to(caller: &Caller<'_>, post: &Post, now: DateTime<Utc>) -> bool {
    match caller {
        Caller::System => true,
        Caller::User(p) => p.is_admin() || p.user_id == post.author_id || post.is_published_at(now),
    }
}

fn blank_post(ctx: &TenantContext, id: u64, author_id: u64, now: DateTime<Utc>) -> Post {
    Post {
        id,
        tenant_id: ctx.tenant_id.clone(),
        author_id,
        category_id: None,
        title: String::new(),
        slug: String::new(),
        excerpt: None,
        content: String::new(),
        meta_title: None,
        meta_description: None,
        meta_keywords: None,
        featured_image_url: None,
        featured_image_alt: None,
        status: PostStatus::Draft,
        is_featured: false,
        allow_comments: true,
        published_at: None,
        scheduled_at: None,
        view_count: 0,
        tag_ids: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}

/// Apply `changes` to `post`. `rows` are the tenant's other posts.
fn apply(
    post: &mut Post,
    changes: PostChanges,
    tag_ids: Option<Vec<u64>>,
    rows: &Rows<Post>,
    is_admin: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    if let Some(featured) = changes.is_featured {
        if featured != post.is_featured && !is_admin {
            return Err(InkError::forbidden("Only admins can feature posts").into_anyhow());
        }
        post.is_featured = featured;
    }

    if let Some(title) = changes.title {
        post.title = title.trim().to_string();
    }
    if let Some(content) = changes.content {
        post.content = content;
    }

    if changes.slug.is_some() || post.slug.is_empty() {
        let mut base = slugify(changes.slug.as_deref().unwrap_or(&post.title), POST_SLUG_MAX);
        if base.is_empty() {
            base = "post".to_string();
        }
        post.slug = unique_slug(&base, |s| rows.values().any(|p| p.slug == s));
    }

    if let Some(excerpt) = changes.excerpt {
        post.excerpt = excerpt;
    }
    if let Some(category_id) = changes.category_id {
        post.category_id = category_id;
    }
    if let Some(allow) = changes.allow_comments {
        post.allow_comments = allow;
    }
    if let Some(v) = changes.meta_title {
        post.meta_title = v;
    }
    if let Some(v) = changes.meta_description {
        post.meta_description = v;
    }
    if let Some(v) = changes.meta_keywords {
        post.meta_keywords = v;
    }
    if let Some(v) = changes.featured_image_url {
        post.featured_image_url = v;
    }
    if let Some(v) = changes.featured_image_alt {
        post.featured_image_alt = v;
    }
    if let Some(at) = changes.scheduled_at {
        post.scheduled_at = at;
    }

    match changes.status {
        Some(PostStatus::Published) => post.publish(now),
        Some(status) => post.status = status,
        None => {}
    }
    if post.status == PostStatus::Scheduled && post.scheduled_at.is_none() {
        return Err(InkError::unprocessable(ERROR_MESSAGE)
            .with_errors(json!({"scheduled_at": ["is required for scheduled posts"]}))
            .into_anyhow());
    }

    if let Some(ids) = tag_ids {
        post.tag_ids = ids;
    }
    post.updated_at = now;
    Ok(())
}

impl PostsService {
    async fn tag_ids_for(&self, ctx: &TenantContext, changes: &mut PostChanges) -> Result<Option<Vec<u64>>> {
        match changes.tags.take() {
            Some(names) => Ok(Some(resolve_tag_names(&self.state, ctx, &names).await?)),
            None => Ok(None),
        }
    }

    /// Shared by update and patch: only the author or an admin may write.
    async fn write(&self, ctx: &TenantContext, id: &str, mut changes: PostChanges, params: &CmsParams) -> Result<Value> {
        let caller = params.caller()?;
        let id = parse_id("Post", id)?;
        let current = self.state.posts.require(ctx, id).await?;
        if let Caller::User(p) = caller {
            if !p.can_edit_post(current.author_id) {
                return Err(InkError::forbidden("You can only edit your own posts").into_anyhow());
            }
        }

        let tag_ids = self.tag_ids_for(ctx, &mut changes).await?;
        let mut previous_tags = Vec::new();
        let post = self
            .state
            .posts
            .update_with(ctx, id, |post, rows| {
                previous_tags = post.tag_ids.clone();
                apply(post, changes, tag_ids, rows, caller.is_admin(), Utc::now())
            })
            .await?;

        refresh_use_counts(&self.state, ctx, previous_tags.into_iter().chain(post.tag_ids.iter().copied())).await?;
        tracing::info!(tenant = %ctx.tenant_id, post = post.id, status = %post.status, "post updated");
        Ok(post.to_json())
    }

    /// Resolves `?category=` given as id or slug.
    async fn category_filter(&self, ctx: &TenantContext, params: &CmsParams) -> Result<Filter> {
        let Some(raw) = params.query_str("category") else {
            return Ok(Filter::Any);
        };
        if let Ok(id) = raw.parse::<u64>() {
            return Ok(Filter::Only(id));
        }
        let slug = raw.to_lowercase();
        let found = self.state.categories.find_one(ctx, |c| c.slug == slug).await?;
        Ok(found.map_or(Filter::Nothing, |c| Filter::Only(c.id)))
    }

    async fn tag_filter(&self, ctx: &TenantContext, params: &CmsParams) -> Result<Filter> {
        let Some(raw) = params.query_str("tag") else {
            return Ok(Filter::Any);
        };
        if let Ok(id) = raw.parse::<u64>() {
            return Ok(Filter::Only(id));
        }
        let slug = raw.to_lowercase();
        let found = self.state.tags.find_one(ctx, |t| t.slug == slug).await?;
        Ok(found.map_or(Filter::Nothing, |t| Filter::Only(t.id)))
    }
}

/// A `?category=` or `?tag=` filter. `Nothing` means it names nothing, so
/// nothing can match.
#[derive(Debug, Clone, Copy)]
enum Filter {
    Any,
    Only(u64),
    Nothing,
}

impl Filter {
    fn id(self) -> Option<u64> {
        match self {
            Filter::Only(id) => Some(id),
            Filter::Any | Filter::Nothing => None,
        }
    }
}

#[async_trait]
impl InkService<Value, CmsParams> for PostsService {
    fn capabilities(&self) -> ServiceCapabilities {
        posts_shared::crud_capabilities()
    }

    /// Newest first. Filters: `status`, `category`, `tag`, `author`,
    /// `featured`, `slug`, `search` (title).
    async fn find(&self, ctx: &TenantContext, params: CmsParams) -> Result<Vec<Value>> {
        let caller = params.caller()?;
        let status = params
            .query_str("status")
            .map(str::parse::<PostStatus>)
            .transpose()
            .map_err(|e| InkError::bad_request(e).into_anyhow())?;
        let author = query_id(&params, "author")?;
        let featured = params.query_bool("featured");
        let slug = params.query_str("slug").map(str::to_lowercase);
        let search = params.query_str("search").map(str::to_lowercase);

        let category = self.category_filter(ctx, &params).await?;
        let tag = self.tag_filter(ctx, &params).await?;
        if matches!(category, Filter::Nothing) || matches!(tag, Filter::Nothing) {
            return Ok(Vec::new());
        }
        let (category, tag) = (category.id(), tag.id());

        let now = Utc::now();
        let mut posts = self
            .state
            .posts
            .find(ctx, |p| {
                visible_to(&caller, p, now)
                    && status.map_or(true, |s| p.status == s)
                    && author.map_or(true, |a| p.author_id == a)
                    && featured.map_or(true, |f| p.is_featured == f)
                    && category.map_or(true, |c| p.category_id == Some(c))
                    && tag.map_or(true, |t| p.tag_ids.contains(&t))
                    && slug.as_deref().map_or(true, |s| p.slug == s)
                    && search
                        .as_deref()
                        .map_or(true, |q| p.title.to_lowercase().contains(q))
            })
            .await?;
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(paginate(posts, &params, self.per_page)
            .iter()
            .map(|p| p.to_json())
            .collect())
    }

    async fn get(&self, ctx: &TenantContext, id: &str, params: CmsParams) -> Result<Value> {
        let caller = params.caller()?;
        let id = parse_id("Post", id)?;
        let post = self.state.posts.require(ctx, id).await?;
        if !visible_to(&caller, &post, Utc::now()) {
            return Err(InkError::not_found("Post not found").into_anyhow());
        }
        Ok(post.to_json())
    }

    async fn create(&self, ctx: &TenantContext, data: Value, params: CmsParams) -> Result<Value> {
        let caller = params.caller()?;
        let input: CreatePost = validate(&data, ERROR_MESSAGE)?;

        let author_id = match caller {
            Caller::User(p) => p.user_id,
            Caller::System => input.author_id.ok_or_else(|| {
                InkError::unprocessable(ERROR_MESSAGE)
                    .with_errors(json!({"author_id": ["is required"]}))
                    .into_anyhow()
            })?,
        };

        let mut changes = PostChanges::from(input);
        let tag_ids = self.tag_ids_for(ctx, &mut changes).await?;
        let now = Utc::now();

        let post = self
            .state
            .posts
            .insert_with(ctx, |id, rows| {
                let mut post = blank_post(ctx, id, author_id, now);
                apply(&mut post, changes, tag_ids, rows, caller.is_admin(), now)?;
                Ok(post)
            })
            .await?;

        refresh_use_counts(&self.state, ctx, post.tag_ids.iter().copied()).await?;
        tracing::info!(tenant = %ctx.tenant_id, post = post.id, slug = %post.slug, status = %post.status, "post created");
        Ok(post.to_json())
    }

    async fn update(&self, ctx: &TenantContext, id: &str, data: Value, params: CmsParams) -> Result<Value> {
        let input: CreatePost = validate(&data, ERROR_MESSAGE)?;
        self.write(ctx, id, input.into(), &params).await
    }

    async fn patch(&self, ctx: &TenantContext, id: Option<&str>, data: Value, params: CmsParams) -> Result<Value> {
        let id = require_id("Post", id)?;
        let input: PatchPost = validate(&data, ERROR_MESSAGE)?;
        self.write(ctx, id, input.into(), &params).await
    }

    async fn remove(&self, ctx: &TenantContext, id: Option<&str>, params: CmsParams) -> Result<Value> {
        let caller = params.caller()?;
        let id = parse_id("Post", require_id("Post", id)?)?;
        let current = self.state.posts.require(ctx, id).await?;
        if let Caller::User(p) = caller {
            if !p.can_delete_post(current.author_id) {
                return Err(InkError::forbidden("You can only delete your own posts").into_anyhow());
            }
        }

        let post = self.state.posts.remove(ctx, id).await?;
        let comments = remove_post_comments(&self.state, ctx, id).await?;
        refresh_use_counts(&self.state, ctx, post.tag_ids.iter().copied()).await?;
        tracing::info!(tenant = %ctx.tenant_id, post = id, comments, "post removed");
        Ok(post.to_json())
    }
}

#[cfg(test)]
mod tests {
    use ink_auth::{Principal, Role};
    use ink_core::ErrorKind;

    use super::*;

    async fn setup() -> (PostsService, Arc<CmsState>, TenantContext) {
        let state = Arc::new(CmsState::in_memory("main").await.unwrap());
        (PostsService::new(Arc::clone(&state), 20), state, TenantContext::new("1"))
    }

    fn as_user(id: u64, role: Role) -> CmsParams {
        CmsParams::for_user(Principal::new(id, "1", role))
    }

    fn id_of(v: &Value) -> String {
        v["id"].as_u64().unwrap().to_string()
    }

    #[tokio::test]
    async fn slugs_are_unique_per_tenant() {
        let (svc, _, ctx) = setup().await;
        let editor = as_user(7, Role::Editor);
        let a = svc.create(&ctx, json!({"title": "Hello World", "content": "x"}), editor.clone()).await.unwrap();
        let b = svc.create(&ctx, json!({"title": "Hello  world!", "content": "y"}), editor.clone()).await.unwrap();
        assert_eq!(a["slug"], "hello-world");
        assert_eq!(b["slug"], "hello-world-2");
        assert_eq!(a["author_id"], 7);

        let other = TenantContext::new("2");
        let c = svc
            .create(&other, json!({"title": "Hello World", "content": "z"}), CmsParams::for_user(Principal::new(8, "2", Role::Admin)))
            .await
            .unwrap();
        assert_eq!(c["slug"], "hello-world");
    }

    #[tokio::test]
    async fn publishing_sets_published_at_once() {
        let (svc, _, ctx) = setup().await;
        let admin = as_user(1, Role::Admin);
        let draft = svc.create(&ctx, json!({"title": "T", "content": "c"}), admin.clone()).await.unwrap();
        assert_eq!(draft["published_at"], Value::Null);
        assert_eq!(draft["status"], "draft");

        let id = id_of(&draft);
        let published = svc.patch(&ctx, Some(&id), json!({"status": "published"}), admin.clone()).await.unwrap();
        assert!(published["published_at"].is_string());
        assert_eq!(published["is_published"], true);

        let again = svc
            .patch(&ctx, Some(&id), json!({"status": "published", "title": "T2"}), admin)
            .await
            .unwrap();
        assert_eq!(again["published_at"], published["published_at"]);
        assert_eq!(again["slug"], "t");
    }

    #[tokio::test]
    async fn editors_only_touch_their_own_posts() {
        let (svc, _, ctx) = setup().await;
        let alice = as_user(10, Role::Editor);
        let bob = as_user(11, Role::Editor);
        let admin = as_user(1, Role::Admin);

        let draft = svc.create(&ctx, json!({"title": "Alice draft", "content": "c"}), alice.clone()).await.unwrap();
        let id = id_of(&draft);

        let err = svc.patch(&ctx, Some(&id), json!({"title": "mine now"}), bob.clone()).await.unwrap_err();
        assert_eq!(InkError::kind_of(&err), ErrorKind::Forbidden);
        let err = svc.remove(&ctx, Some(&id), bob.clone()).await.unwrap_err();
        assert_eq!(InkError::kind_of(&err), ErrorKind::Forbidden);

        assert!(svc.find(&ctx, bob.clone()).await.unwrap().is_empty());
        let err = svc.get(&ctx, &id, bob.clone()).await.unwrap_err();
        assert_eq!(InkError::kind_of(&err), ErrorKind::NotFound);

        let edited = svc.patch(&ctx, Some(&id), json!({"title": "Edited by admin"}), admin.clone()).await.unwrap();
        assert_eq!(edited["title"], "Edited by admin");

        svc.patch(&ctx, Some(&id), json!({"status": "published"}), alice.clone()).await.unwrap();
        assert_eq!(svc.find(&ctx, bob).await.unwrap().len(), 1);

        let err = svc.patch(&ctx, Some(&id), json!({"is_featured": true}), alice).await.unwrap_err();
        assert_eq!(InkError::kind_of(&err), ErrorKind::Forbidden);
        svc.remove(&ctx, Some(&id), admin).await.unwrap();
    }

    #[tokio::test]
    async fn tags_are_created_and_counted() {
        let (svc, state, ctx) = setup().await;
        let admin = as_user(1, Role::Admin);
        let first = svc
            .create(&ctx, json!({"title": "One", "content": "c", "tags": "rust, web"}), admin.clone())
            .await
            .unwrap();
        svc.create(&ctx, json!({"title": "Two", "content": "c", "tags": ["Rust"]}), admin.clone())
            .await
            .unwrap();

        let rust = state.tags.find_one(&ctx, |t| t.slug == "rust").await.unwrap().unwrap();
        assert_eq!(rust.use_count, 2);

        let id = id_of(&first);
        svc.patch(&ctx, Some(&id), json!({"tags": []}), admin.clone()).await.unwrap();
        let rust = state.tags.get(&ctx, rust.id).await.unwrap().unwrap();
        assert_eq!(rust.use_count, 1);
        let web = state.tags.find_one(&ctx, |t| t.slug == "web").await.unwrap().unwrap();
        assert_eq!(web.use_count, 0);

        let tagged = svc
            .find(&ctx, admin.with_query("tag", "rust"))
            .await
            .unwrap();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0]["title"], "Two");
    }

    #[tokio::test]
    async fn other_tenants_get_not_found() {
        let (svc, _, ctx) = setup().await;
        let admin = as_user(1, Role::Admin);
        let post = svc.create(&ctx, json!({"title": "Mine", "content": "c"}), admin).await.unwrap();
        let id = id_of(&post);

        let other = TenantContext::new("2");
        let intruder = CmsParams::for_user(Principal::new(99, "2", Role::Admin));
        for err in [
            svc.get(&other, &id, intruder.clone()).await.unwrap_err(),
            svc.patch(&other, Some(&id), json!({"title": "x"}), intruder.clone()).await.unwrap_err(),
            svc.remove(&other, Some(&id), intruder.clone()).await.unwrap_err(),
        ] {
            assert_eq!(InkError::kind_of(&err), ErrorKind::NotFound);
        }
        assert!(svc.find(&other, intruder).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn scheduled_posts_need_a_time() {
        let (svc, _, ctx) = setup().await;
        let err = svc
            .create(&ctx, json!({"title": "Later", "content": "c", "status": "scheduled"}), as_user(1, Role::Admin))
            .await
            .unwrap_err();
        assert_eq!(InkError::kind_of(&err), ErrorKind::Unprocessable);

        let err = svc
            .create(&ctx, json!({"title": "No author", "content": "c"}), CmsParams::system())
            .await
            .unwrap_err();
        assert_eq!(InkError::kind_of(&err), ErrorKind::Unprocessable);
    }

    #[tokio::test]
    async fn removing_a_post_drops_its_comments() {
        use crate::models::{Comment, CommentStatus};

        let (svc, state, ctx) = setup().await;
        let admin = as_user(1, Role::Admin);
        let gone = svc.create(&ctx, json!({"title": "Gone", "content": "c"}), admin.clone()).await.unwrap();
        let kept = svc.create(&ctx, json!({"title": "Kept", "content": "c"}), admin.clone()).await.unwrap();

        for post in [&gone, &kept] {
            let post_id = post["id"].as_u64().unwrap();
            state
                .comments
                .insert_with(&ctx, |id, _| {
                    let now = Utc::now();
                    Ok(Comment {
                        id,
                        tenant_id: ctx.tenant_id.clone(),
                        post_id,
                        parent_id: None,
                        user_id: None,
                        author_name: "Ann".into(),
                        author_email: "ann@example.org".into(),
                        author_website: None,
                        author_ip: None,
                        content: "hi".into(),
                        status: CommentStatus::Approved,
                        created_at: now,
                        updated_at: now,
                    })
                })
                .await
                .unwrap();
        }

        svc.remove(&ctx, Some(&id_of(&gone)), admin).await.unwrap();
        let left = state.comments.find(&ctx, |_| true).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].post_id, kept["id"].as_u64().unwrap());
    }
}
