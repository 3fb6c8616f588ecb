use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use ink_core::TenantId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{opt_ts, ts};
use crate::text;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
    Scheduled,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
            PostStatus::Scheduled => "scheduled",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(PostStatus::Draft),
            "published" => Ok(PostStatus::Published),
            "scheduled" => Ok(PostStatus::Scheduled),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    pub tenant_id: TenantId,
    pub author_id: u64,
    pub category_id: Option<u64>,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub meta_keywords: Option<String>,
    pub featured_image_url: Option<String>,
    pub featured_image_alt: Option<String>,
    pub status: PostStatus,
    pub is_featured: bool,
    pub allow_comments: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub view_count: u64,
    pub tag_ids: Vec<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Published with a publication time that has passed.
    pub fn is_published_at(&self, now: DateTime<Utc>) -> bool {
        self.status == PostStatus::Published && self.published_at.is_some_and(|at| at <= now)
    }

    pub fn is_published(&self) -> bool {
        self.is_published_at(Utc::now())
    }

    pub fn is_scheduled(&self) -> bool {
        self.status == PostStatus::Scheduled && self.scheduled_at.is_some_and(|at| at > Utc::now())
    }

    /// Status becomes published; the first publication time sticks.
    pub fn publish(&mut self, now: DateTime<Utc>) {
        self.status = PostStatus::Published;
        if self.published_at.is_none() {
            self.published_at = Some(now);
        }
    }

    pub fn url(&self) -> String {
        format!("/post/{}", self.slug)
    }

    /// The explicit excerpt, or one derived from the content.
    pub fn summary(&self) -> String {
        match self.excerpt.as_deref().map(str::trim) {
            Some(ex) if !ex.is_empty() => text::excerpt(ex),
            _ => text::excerpt(&self.content),
        }
    }

    pub fn reading_time(&self) -> u32 {
        text::reading_time(&self.content)
    }

    /// Case-insensitive match against title, excerpt and content.
    pub fn matches_text(&self, needle_lower: &str) -> bool {
        self.title.to_lowercase().contains(needle_lower)
            || self
                .excerpt
                .as_deref()
                .is_some_and(|e| e.to_lowercase().contains(needle_lower))
            || self.content.to_lowercase().contains(needle_lower)
    }

    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "author_id": self.author_id,
            "category_id": self.category_id,
            "title": self.title,
            "slug": self.slug,
            "excerpt": self.summary(),
            "content": self.content,
            "meta_title": self.meta_title,
            "meta_description": self.meta_description,
            "meta_keywords": self.meta_keywords,
            "featured_image_url": self.featured_image_url,
            "featured_image_alt": self.featured_image_alt,
            "status": self.status,
            "is_featured": self.is_featured,
            "is_published": self.is_published(),
            "allow_comments": self.allow_comments,
            "published_at": opt_ts(&self.published_at),
            "scheduled_at": opt_ts(&self.scheduled_at),
            "view_count": self.view_count,
            "reading_time": self.reading_time(),
            "url": self.url(),
            "tag_ids": self.tag_ids,
            "created_at": ts(&self.created_at),
            "updated_at": ts(&self.updated_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn post() -> Post {
        let now = Utc::now();
        Post {
            id: 1,
            tenant_id: TenantId::from("1"),
            author_id: 1,
            category_id: None,
            title: "Hello".into(),
            slug: "hello".into(),
            excerpt: None,
            content: "<p>Body text</p>".into(),
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
            tag_ids: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn publishing_keeps_the_first_date() {
        let mut p = post();
        let first = Utc::now() - Duration::days(3);
        p.publish(first);
        p.status = PostStatus::Draft;
        p.publish(Utc::now());
        assert_eq!(p.published_at, Some(first));
        assert!(p.is_published());
    }

    #[test]
    fn future_publication_is_not_published_yet() {
        let mut p = post();
        p.publish(Utc::now() + Duration::hours(1));
        assert!(!p.is_published());
    }

    #[test]
    fn summary_falls_back_to_content() {
        let mut p = post();
        assert_eq!(p.summary(), "Body text");
        p.excerpt = Some("Custom".into());
        assert_eq!(p.summary(), "Custom");
        assert_eq!(p.to_json()["url"], "/post/hello");
    }

    #[test]
    fn statuses_parse() {
        assert_eq!("Published".parse::<PostStatus>(), Ok(PostStatus::Published));
        assert!("private".parse::<PostStatus>().is_err());
    }
}
