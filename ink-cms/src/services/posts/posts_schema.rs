use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

use crate::models::PostStatus;
use crate::validate::{clean, double_option, not_blank};

pub const ERROR_MESSAGE: &str = "Posts schema validation failed";

/// Tags arrive either as `"a, b"` (form style) or as `["a", "b"]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TagNames {
    Csv(String),
    List(Vec<String>),
}

impl TagNames {
    /// Trimmed, non-empty names without case-insensitive duplicates.
    pub fn names(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            TagNames::Csv(s) => s.split(',').collect(),
            TagNames::List(v) => v.iter().map(String::as_str).collect(),
        };

        let mut out: Vec<String> = Vec::new();
        for name in raw.into_iter().map(str::trim).filter(|n| !n.is_empty()) {
            if !out.iter().any(|seen| seen.eq_ignore_ascii_case(name)) {
                out.push(name.to_string());
            }
        }
        out
    }
}

/// Body of `create` and `update`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePost {
    #[validate(length(max = 200), custom(function = "not_blank"))]
    pub title: String,
    #[validate(custom(function = "not_blank"))]
    pub content: String,
    #[validate(length(max = 200))]
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub category_id: Option<u64>,
    pub tags: Option<TagNames>,
    pub status: Option<PostStatus>,
    pub is_featured: Option<bool>,
    pub allow_comments: Option<bool>,
    #[validate(length(max = 200))]
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    #[validate(length(max = 255))]
    pub meta_keywords: Option<String>,
    #[validate(length(max = 255))]
    pub featured_image_url: Option<String>,
    #[validate(length(max = 200))]
    pub featured_image_alt: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Only honoured for internal calls; users always author their own posts.
    pub author_id: Option<u64>,
}

/// Body of `patch`: every field optional, `null` clears nullable ones.
#[derive(Debug, Deserialize, Validate)]
pub struct PatchPost {
    #[validate(length(max = 200), custom(function = "not_blank"))]
    pub title: Option<String>,
    #[validate(custom(function = "not_blank"))]
    pub content: Option<String>,
    #[validate(length(max = 200))]
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<u64>>,
    pub tags: Option<TagNames>,
    pub status: Option<PostStatus>,
    pub is_featured: Option<bool>,
    pub allow_comments: Option<bool>,
    #[validate(length(max = 200))]
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    #[validate(length(max = 255))]
    pub meta_keywords: Option<String>,
    #[validate(length(max = 255))]
    pub featured_image_url: Option<String>,
    #[validate(length(max = 200))]
    pub featured_image_alt: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub scheduled_at: Option<Option<DateTime<Utc>>>,
}

/// What a write changes on a post. `None` leaves a field alone.
#[derive(Debug, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub slug: Option<String>,
    pub excerpt: Option<Option<String>>,
    pub category_id: Option<Option<u64>>,
    pub tags: Option<Vec<String>>,
    pub status: Option<PostStatus>,
    pub is_featured: Option<bool>,
    pub allow_comments: Option<bool>,
    pub meta_title: Option<Option<String>>,
    pub meta_description: Option<Option<String>>,
    pub meta_keywords: Option<Option<String>>,
    pub featured_image_url: Option<Option<String>>,
    pub featured_image_alt: Option<Option<String>>,
    pub scheduled_at: Option<Option<DateTime<Utc>>>,
}

impl From<CreatePost> for PostChanges {
    /// A full write: optional fields that are absent are cleared.
    fn from(p: CreatePost) -> Self {
        Self {
            title: Some(p.title),
            content: Some(p.content),
            slug: clean(p.slug),
            excerpt: Some(clean(p.excerpt)),
            category_id: Some(p.category_id),
            tags: Some(p.tags.map(|t| t.names()).unwrap_or_default()),
            status: Some(p.status.unwrap_or_default()),
            is_featured: p.is_featured,
            allow_comments: Some(p.allow_comments.unwrap_or(true)),
            meta_title: Some(clean(p.meta_title)),
            meta_description: Some(clean(p.meta_description)),
            meta_keywords: Some(clean(p.meta_keywords)),
            featured_image_url: Some(clean(p.featured_image_url)),
            featured_image_alt: Some(clean(p.featured_image_alt)),
            scheduled_at: Some(p.scheduled_at),
        }
    }
}

impl From<PatchPost> for PostChanges {
    /// Blank strings clear the optional text fields.
    fn from(p: PatchPost) -> Self {
        let text = |v: Option<String>| v.map(|s| clean(Some(s)));
        Self {
            title: p.title,
            content: p.content,
            slug: clean(p.slug),
            excerpt: text(p.excerpt),
            category_id: p.category_id,
            tags: p.tags.map(|t| t.names()),
            status: p.status,
            is_featured: p.is_featured,
            allow_comments: p.allow_comments,
            meta_title: text(p.meta_title),
            meta_description: text(p.meta_description),
            meta_keywords: text(p.meta_keywords),
            featured_image_url: text(p.featured_image_url),
            featured_image_alt: text(p.featured_image_alt),
            scheduled_at: p.scheduled_at,
        }
    }
}
