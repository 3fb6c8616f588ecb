use serde::Deserialize;
use validator::Validate;

use crate::models::CommentStatus;
use crate::validate::not_blank;

pub const ERROR_MESSAGE: &str = "Comments schema validation failed";

/// Signed-in authors are taken from their account; the `author_*` fields
/// only count for guests.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateComment {
    pub post_id: u64,
    pub parent_id: Option<u64>,
    #[validate(length(max = 5000), custom(function = "not_blank"))]
    pub content: String,
    #[validate(length(max = 100))]
    pub author_name: Option<String>,
    #[validate(email(message = "must be a valid email"))]
    pub author_email: Option<String>,
    #[validate(length(max = 200))]
    pub author_website: Option<String>,
    #[validate(length(max = 45))]
    pub author_ip: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PatchComment {
    pub status: Option<CommentStatus>,
    #[validate(length(max = 5000), custom(function = "not_blank"))]
    pub content: Option<String>,
}
