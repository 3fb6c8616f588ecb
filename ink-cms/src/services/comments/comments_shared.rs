use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use ink_core::{InkApp, ServiceCapabilities, ServiceMethodKind, TenantContext};
use serde_json::Value;

use crate::hooks::RequireAdmin;
use crate::models::Comment;
use crate::services::CmsParams;
use crate::store::CmsState;

pub fn capabilities() -> ServiceCapabilities {
    ServiceCapabilities::from_methods(vec![
        ServiceMethodKind::Find,
        ServiceMethodKind::Get,
        ServiceMethodKind::Create,
        ServiceMethodKind::Patch,
        ServiceMethodKind::Remove,
    ])
}

/// Anyone signed in may comment; moderation is for admins.
pub fn register_hooks(app: &InkApp<Value, CmsParams>) -> anyhow::Result<()> {
    app.service("comments")?.hooks(|h| {
        h.before_patch(Arc::new(RequireAdmin));
        h.before_remove(Arc::new(RequireAdmin));
    });
    Ok(())
}

pub fn reply_count(comments: &[Comment], id: u64) -> usize {
    comments.iter().filter(|c| c.parent_id == Some(id)).count()
}

/// Public shape, plus the author's contact details for moderators.
pub fn comment_json(comment: &Comment, replies: usize, moderator: bool) -> Value {
    let mut body = comment.to_json(replies);
    if moderator {
        body["author_email"] = Value::String(comment.author_email.clone());
        body["author_ip"] = comment.author_ip.clone().map_or(Value::Null, Value::String);
    }
    body
}

/// `root` and every reply below it.
pub fn thread_ids(comments: &[Comment], root: u64) -> BTreeSet<u64> {
    let mut ids = BTreeSet::from([root]);
    loop {
        let before = ids.len();
        for c in comments {
            if c.parent_id.is_some_and(|p| ids.contains(&p)) {
                ids.insert(c.id);
            }
        }
        if ids.len() == before {
            return ids;
        }
    }
}

/// Drops the comments of a post that is being removed.
pub async fn remove_post_comments(state: &CmsState, ctx: &TenantContext, post_id: u64) -> Result<usize> {
    Ok(state.comments.remove_where(ctx, |c| c.post_id == post_id).await?.len())
}
