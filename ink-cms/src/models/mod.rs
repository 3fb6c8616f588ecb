//! Records kept by the content store.
//!
//! Every tenant-scoped record carries the id of the tenant it belongs to;
//! see [`crate::store::TenantScoped`].

pub mod category;
pub mod comment;
pub mod media;
pub mod post;
pub mod setting;
pub mod tag;
pub mod tenant;
pub mod user;

pub use category::Category;
pub use comment::{Comment, CommentStatus};
pub use media::MediaFile;
pub use post::{Post, PostStatus};
pub use setting::{Setting, SettingType};
pub use tag::Tag;
pub use tenant::Tenant;
pub use user::User;

use chrono::{DateTime, Utc};
use serde_json::Value;

pub(crate) fn ts(at: &DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339())
}

pub(crate) fn opt_ts(at: &Option<DateTime<Utc>>) -> Value {
    at.as_ref().map_or(Value::Null, ts)
}
