use ink_auth::Role;
use serde::Deserialize;
use validator::Validate;

pub const ERROR_MESSAGE: &str = "Users schema validation failed";

/// Body of `create`. The plain password was already replaced by its hash.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUser {
    #[validate(email(message = "must be a valid email"))]
    pub email: String,
    #[validate(length(min = 3, max = 20, message = "Username must be between 3 and 20 characters"))]
    pub username: String,
    pub password_hash: Option<String>,
    #[validate(length(max = 50))]
    pub first_name: Option<String>,
    #[validate(length(max = 50))]
    pub last_name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    #[validate(length(max = 500))]
    pub bio: Option<String>,
    #[validate(length(max = 255))]
    pub avatar_url: Option<String>,
    #[validate(length(max = 255))]
    pub website_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PatchUser {
    #[validate(email(message = "must be a valid email"))]
    pub email: Option<String>,
    #[validate(length(min = 3, max = 20, message = "Username must be between 3 and 20 characters"))]
    pub username: Option<String>,
    pub password_hash: Option<String>,
    #[validate(length(max = 50))]
    pub first_name: Option<String>,
    #[validate(length(max = 50))]
    pub last_name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    #[validate(length(max = 500))]
    pub bio: Option<String>,
    #[validate(length(max = 255))]
    pub avatar_url: Option<String>,
    #[validate(length(max = 255))]
    pub website_url: Option<String>,
}
