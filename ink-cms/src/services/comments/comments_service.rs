use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use ink_core::errors::InkError;
use ink_core::{InkService, ServiceCapabilities, TenantContext};
use serde_json::{json, Value};

use crate::models::user::normalize_website;
use crate::models::{Comment, CommentStatus};
use crate::services::shared::{paginate, query_id, require_id, MAX_PER_PAGE};
use crate::services::{Caller, CmsParams};
use crate::store::{parse_id, CmsState};
use crate::validate::{clean, validate, FieldErrors};

use super::comments_schema::{CreateComment, PatchComment, ERROR_MESSAGE};
use super::comments_shared::{self, comment_json, reply_count, thread_ids};

/// Comments on posts.
///
/// Readers only ever see approved comments; admins see every status along
/// with the author's email and address. Calls made by the CMS itself
/// (the public comment form) post as guests.
pub struct CommentsService {
    state: Arc<CmsState>,
}

impl CommentsService {
    pub fn new(state: Arc<CmsState>) -> Self {
        Self { state }
    }

    /// Name, email and website of whoever is commenting.
    async fn author(
        &self,
        ctx: &TenantContext,
        caller: Caller<'_>,
        input: &CreateComment,
    ) -> Result<(Option<u64>, String, String, Option<String>)> {
        if let Caller::User(p) = caller {
            let user = self.state.users.require(ctx, p.user_id).await?;
            return Ok((Some(user.id), user.full_name(), user.email, user.website_url));
        }

        let name = clean(input.author_name.clone());
        let email = clean(input.author_email.clone());
        let mut errors = FieldErrors::default();
        if name.is_none() {
            errors.push("author_name", "is required");
        }
        if email.is_none() {
            errors.push("author_email", "is required");
        }
        errors.finish(ERROR_MESSAGE)?;

        let website = input.author_website.as_deref().and_then(normalize_website);
        Ok((
            None,
            name.unwrap_or_default(),
            email.unwrap_or_default().to_lowercase(),
            website,
        ))
    }
}

fn status_filter(params: &CmsParams) -> Result<Option<CommentStatus>> {
    params
        .query_str("status")
        .map(str::parse::<CommentStatus>)
        .transpose()
        .map_err(|e| InkError::bad_request(e).into_anyhow())
}

#[async_trait]
impl InkService<Value, CmsParams> for CommentsService {
    fn capabilities(&self) -> ServiceCapabilities {
        comments_shared::capabilities()
    }

    /// `?post=` and `?status=` filter. A post's thread reads oldest first,
    /// everything else newest first.
    async fn find(&self, ctx: &TenantContext, params: CmsParams) -> Result<Vec<Value>> {
        let caller = params.caller()?;
        let moderator = caller.is_admin();
        let post = query_id(&params, "post")?;
        let status = status_filter(&params)?;

        let visible = self
            .state
            .comments
            .find(ctx, |c| moderator || c.is_approved())
            .await?;
        let mut matching: Vec<&Comment> = visible
            .iter()
            .filter(|c| post.map_or(true, |p| c.post_id == p))
            .filter(|c| status.map_or(true, |s| c.status == s))
            .collect();
        if post.is_some() {
            matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        } else {
            matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        }

        Ok(paginate(matching, &params, MAX_PER_PAGE)
            .into_iter()
            .map(|c| comment_json(c, reply_count(&visible, c.id), moderator))
            .collect())
    }

    async fn get(&self, ctx: &TenantContext, id: &str, params: CmsParams) -> Result<Value> {
        let moderator = params.caller()?.is_admin();
        let id = parse_id("Comment", id)?;
        let comment = self
            .state
            .comments
            .get(ctx, id)
            .await?
            .filter(|c| moderator || c.is_approved())
            .ok_or_else(|| InkError::not_found("Comment not found").into_anyhow())?;

        let replies = self
            .state
            .comments
            .count(ctx, |c| c.parent_id == Some(id) && (moderator || c.is_approved()))
            .await?;
        Ok(comment_json(&comment, replies, moderator))
    }

    /// Comments from admins are approved straight away; the rest wait in
    /// the moderation queue.
    async fn create(&self, ctx: &TenantContext, data: Value, params: CmsParams) -> Result<Value> {
        let caller = params.caller()?;
        let input: CreateComment = validate(&data, ERROR_MESSAGE)?;

        let post = self
            .state
            .posts
            .get(ctx, input.post_id)
            .await?
            .filter(|p| p.is_published() || caller.is_admin())
            .ok_or_else(|| {
                InkError::unprocessable(ERROR_MESSAGE)
                    .with_errors(json!({"post_id": ["Post not found"]}))
                    .into_anyhow()
            })?;
        if !post.allow_comments {
            return Err(InkError::forbidden("Comments are closed for this post").into_anyhow());
        }

        let (user_id, author_name, author_email, author_website) = self.author(ctx, caller, &input).await?;
        let status = match caller {
            Caller::User(p) if p.is_admin() => CommentStatus::Approved,
            _ => CommentStatus::Pending,
        };
        let author_ip = match caller {
            Caller::System => clean(input.author_ip.clone()),
            Caller::User(_) => None,
        };

        let comment = self
            .state
            .comments
            .insert_with(ctx, |id, rows| {
                if let Some(parent) = input.parent_id {
                    if !rows.get(&parent).is_some_and(|c| c.post_id == post.id) {
                        return Err(InkError::unprocessable(ERROR_MESSAGE)
                            .with_errors(json!({"parent_id": ["Parent comment not found"]}))
                            .into_anyhow());
                    }
                }
                let now = Utc::now();
                Ok(Comment {
                    id,
                    tenant_id: ctx.tenant_id.clone(),
                    post_id: post.id,
                    parent_id: input.parent_id,
                    user_id,
                    author_name: author_name.clone(),
                    author_email: author_email.clone(),
                    author_website: author_website.clone(),
                    author_ip: author_ip.clone(),
                    content: input.content.trim().to_string(),
                    status,
                    created_at: now,
                    updated_at: now,
                })
            })
            .await?;

        tracing::info!(tenant = %ctx.tenant_id, post = post.id, comment = comment.id, %status, "comment received");
        Ok(comment_json(&comment, 0, caller.is_admin()))
    }

    /// Moderation: status and content.
    async fn patch(&self, ctx: &TenantContext, id: Option<&str>, data: Value, _params: CmsParams) -> Result<Value> {
        let id = parse_id("Comment", require_id("Comment", id)?)?;
        let input: PatchComment = validate(&data, ERROR_MESSAGE)?;

        let comment = self
            .state
            .comments
            .update_with(ctx, id, |c, _| {
                let now = Utc::now();
                if let Some(status) = input.status {
                    c.set_status(status, now);
                }
                if let Some(content) = input.content.as_deref() {
                    c.content = content.trim().to_string();
                    c.updated_at = now;
                }
                Ok(())
            })
            .await?;

        tracing::info!(tenant = %ctx.tenant_id, comment = id, status = %comment.status, "comment moderated");
        let replies = self.state.comments.count(ctx, |c| c.parent_id == Some(id)).await?;
        Ok(comment_json(&comment, replies, true))
    }

    /// Removes the comment with every reply below it.
    async fn remove(&self, ctx: &TenantContext, id: Option<&str>, _params: CmsParams) -> Result<Value> {
        let id = parse_id("Comment", require_id("Comment", id)?)?;
        let comment = self.state.comments.require(ctx, id).await?;

        let all = self.state.comments.find(ctx, |_| true).await?;
        let thread = thread_ids(&all, id);
        let removed = self
            .state
            .comments
            .remove_where(ctx, |c| thread.contains(&c.id))
            .await?
            .len();

        tracing::info!(tenant = %ctx.tenant_id, comment = id, removed, "comment removed");
        Ok(comment_json(&comment, removed.saturating_sub(1), true))
    }
}

#[cfg(test)]
mod tests {
    use ink_auth::{Principal, Role};
    use ink_core::{ErrorKind, TenantId};

    use super::*;
    use crate::models::{Post, PostStatus};
    use crate::services::users::users_shared::{insert_user, NewUser};

    fn post(ctx: &TenantContext, id: u64, allow_comments: bool) -> Post {
        let now = Utc::now();
        Post {
            id,
            tenant_id: ctx.tenant_id.clone(),
            author_id: 1,
            category_id: None,
            title: format!("Post {id}"),
            slug: format!("post-{id}"),
            excerpt: None,
            content: "<p>Body</p>".into(),
            meta_title: None,
            meta_description: None,
            meta_keywords: None,
            featured_image_url: None,
            featured_image_alt: None,
            status: PostStatus::Published,
            is_featured: false,
            allow_comments,
            published_at: Some(now),
            scheduled_at: None,
            view_count: 0,
            tag_ids: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    async fn setup() -> (CommentsService, Arc<CmsState>, TenantContext, u64, u64) {
        let state = Arc::new(CmsState::in_memory("main").await.unwrap());
        let ctx = TenantContext::new("1");
        let open = state.posts.insert_with(&ctx, |id, _| Ok(post(&ctx, id, true))).await.unwrap();
        let closed = state.posts.insert_with(&ctx, |id, _| Ok(post(&ctx, id, false))).await.unwrap();
        (CommentsService::new(Arc::clone(&state)), state, ctx, open.id, closed.id)
    }

    async fn user(state: &CmsState, ctx: &TenantContext, name: &str, role: Role) -> CmsParams {
        let user = insert_user(
            state,
            ctx,
            NewUser {
                email: format!("{name}@example.org"),
                username: name.into(),
                password_hash: String::new(),
                first_name: name.into(),
                last_name: "Reader".into(),
                role,
                is_active: true,
                is_super_admin: false,
            },
        )
        .await
        .unwrap();
        CmsParams::for_user(Principal::new(user.id, ctx.tenant_id.clone(), role))
    }

    fn guest(post_id: u64, content: &str) -> Value {
        json!({
            "post_id": post_id,
            "content": content,
            "author_name": "Guest",
            "author_email": "Guest@Example.org",
            "author_website": "guest.dev",
            "author_ip": "10.0.0.9",
        })
    }

    fn id_of(v: &Value) -> String {
        v["id"].as_u64().unwrap().to_string()
    }

    #[tokio::test]
    async fn guests_need_a_name_and_email_and_wait_for_approval() {
        let (svc, _, ctx, post_id, _) = setup().await;

        let err = svc
            .create(&ctx, json!({"post_id": post_id, "content": "hi"}), CmsParams::system())
            .await
            .unwrap_err();
        assert_eq!(InkError::kind_of(&err), ErrorKind::Unprocessable);

        let c = svc.create(&ctx, guest(post_id, "Nice post"), CmsParams::system()).await.unwrap();
        assert_eq!(c["status"], "pending");
        assert_eq!(c["is_guest"], true);
        assert_eq!(c["author_email"], "guest@example.org");
        assert_eq!(c["author_website"], "https://guest.dev");
        assert_eq!(c["author_ip"], "10.0.0.9");
    }

    #[tokio::test]
    async fn readers_only_see_approved_comments() {
        let (svc, state, ctx, post_id, _) = setup().await;
        let reader = user(&state, &ctx, "rita", Role::Editor).await;
        let admin = user(&state, &ctx, "adam", Role::Admin).await;

        let pending = svc.create(&ctx, guest(post_id, "waiting"), CmsParams::system()).await.unwrap();
        let own = svc
            .create(&ctx, json!({"post_id": post_id, "content": "mine", "author_ip": "1.2.3.4"}), reader.clone())
            .await
            .unwrap();
        assert_eq!(own["status"], "pending");
        assert_eq!(own["author_name"], "rita Reader");
        assert!(own.get("author_ip").is_none());

        let by_admin = svc
            .create(&ctx, json!({"post_id": post_id, "content": "welcome"}), admin.clone())
            .await
            .unwrap();
        assert_eq!(by_admin["status"], "approved");

        let seen = svc.find(&ctx, reader.clone().with_query("post", post_id.to_string())).await.unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["content"], "welcome");
        assert!(seen[0].get("author_email").is_none());
        let err = svc.get(&ctx, &id_of(&pending), reader.clone()).await.unwrap_err();
        assert_eq!(InkError::kind_of(&err), ErrorKind::NotFound);

        let queue = svc.find(&ctx, admin.clone().with_query("status", "pending")).await.unwrap();
        assert_eq!(queue.len(), 2);
        assert!(svc.find(&ctx, admin.with_query("status", "gone")).await.is_err());
    }

    #[tokio::test]
    async fn closed_posts_and_foreign_parents_are_rejected() {
        let (svc, state, ctx, open, closed) = setup().await;

        let err = svc.create(&ctx, guest(closed, "hello"), CmsParams::system()).await.unwrap_err();
        assert_eq!(InkError::kind_of(&err), ErrorKind::Forbidden);

        let other = state.posts.insert_with(&ctx, |id, _| Ok(post(&ctx, id, true))).await.unwrap();
        let elsewhere = svc.create(&ctx, guest(other.id, "there"), CmsParams::system()).await.unwrap();
        let mut reply = guest(open, "reply");
        reply["parent_id"] = elsewhere["id"].clone();
        let err = svc.create(&ctx, reply, CmsParams::system()).await.unwrap_err();
        assert_eq!(InkError::kind_of(&err), ErrorKind::Unprocessable);

        let err = svc.create(&ctx, guest(9_999, "void"), CmsParams::system()).await.unwrap_err();
        assert_eq!(InkError::kind_of(&err), ErrorKind::Unprocessable);
    }

    #[tokio::test]
    async fn moderation_changes_status_and_removal_takes_replies() {
        let (svc, state, ctx, post_id, _) = setup().await;
        let root = svc.create(&ctx, guest(post_id, "root"), CmsParams::system()).await.unwrap();
        let mut reply = guest(post_id, "reply");
        reply["parent_id"] = root["id"].clone();
        svc.create(&ctx, reply, CmsParams::system()).await.unwrap();
        let sibling = svc.create(&ctx, guest(post_id, "sibling"), CmsParams::system()).await.unwrap();

        let approved = svc
            .patch(&ctx, Some(&id_of(&root)), json!({"status": "approved"}), CmsParams::system())
            .await
            .unwrap();
        assert_eq!(approved["is_approved"], true);
        assert_eq!(approved["reply_count"], 1);
        let err = svc
            .patch(&ctx, Some(&id_of(&root)), json!({"status": "deleted"}), CmsParams::system())
            .await
            .unwrap_err();
        assert_eq!(InkError::kind_of(&err), ErrorKind::Unprocessable);

        let removed = svc.remove(&ctx, Some(&id_of(&root)), CmsParams::system()).await.unwrap();
        assert_eq!(removed["reply_count"], 1);
        let left = state.comments.find(&ctx, |_| true).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, sibling["id"].as_u64().unwrap());
    }

    #[tokio::test]
    async fn comments_stay_inside_their_tenant() {
        let (svc, state, ctx, post_id, _) = setup().await;
        let c = svc.create(&ctx, guest(post_id, "ours"), CmsParams::system()).await.unwrap();
        let id = id_of(&c);

        let other = TenantContext::new("2");
        let intruder = CmsParams::for_user(Principal::new(50, TenantId::from("2"), Role::Admin));
        assert!(svc.find(&other, intruder.clone()).await.unwrap().is_empty());
        for err in [
            svc.get(&other, &id, intruder.clone()).await.unwrap_err(),
            svc.patch(&other, Some(&id), json!({"status": "spam"}), intruder.clone()).await.unwrap_err(),
            svc.remove(&other, Some(&id), intruder.clone()).await.unwrap_err(),
        ] {
            assert_eq!(InkError::kind_of(&err), ErrorKind::NotFound);
        }
        // The post id only exists in tenant 1.
        let err = svc.create(&other, guest(post_id, "theirs"), CmsParams::system()).await.unwrap_err();
        assert_eq!(InkError::kind_of(&err), ErrorKind::Unprocessable);

        let ours = state.comments.require(&ctx, c["id"].as_u64().unwrap()).await.unwrap();
        assert_eq!(ours.status, CommentStatus::Pending);
    }
}
