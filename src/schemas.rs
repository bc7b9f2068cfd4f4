use chrono::NaiveDateTime;
use model::entities::{bbs_cmt, bbs_post, user};
use moka::future::Cache;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::config::AppConfig;
use crate::templates::Templates;

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// Cache for user lookups and the front page listing
    pub cache: Cache<String, CachedData>,
    /// Compiled page templates
    pub templates: Templates,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        cache: Cache<String, CachedData>,
        templates: Templates,
        config: AppConfig,
    ) -> Self {
        Self {
            db,
            cache,
            templates,
            config: Arc::new(config),
        }
    }
}

/// Cached data types
#[derive(Clone, Debug)]
pub enum CachedData {
    User(user::Model),
    RecentPosts(Vec<PostSummary>),
}

/// Cache key of the front page topic listing.
pub const RECENT_POSTS_KEY: &str = "recent_posts";

pub fn user_cache_key(user_id: i32) -> String {
    format!("user_{}", user_id)
}

/// A topic as shown in listings
#[derive(Clone, Debug, Serialize)]
pub struct PostSummary {
    pub id: i32,
    pub title: String,
    /// Nickname, or anonyname for anonymous topics
    pub author_name: String,
    /// Profile link target; absent for anonymous topics
    pub author_urlname: Option<String>,
    pub anonymous: bool,
    pub reply_count: u64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl PostSummary {
    pub fn new(post: bbs_post::Model, author: Option<&user::Model>, reply_count: u64) -> Self {
        let (author_name, author_urlname) = author_fields(author, post.anonymous);
        Self {
            id: post.id,
            title: post.title,
            author_name,
            author_urlname,
            anonymous: post.anonymous,
            reply_count,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

/// A reply as shown under its topic
#[derive(Clone, Debug, Serialize)]
pub struct CommentView {
    pub id: i32,
    pub post_id: i32,
    pub floor: i32,
    pub content: String,
    pub author_name: String,
    pub author_urlname: Option<String>,
    pub created_at: NaiveDateTime,
}

impl CommentView {
    pub fn new(cmt: bbs_cmt::Model, author: Option<&user::Model>) -> Self {
        let (author_name, author_urlname) = author_fields(author, cmt.anonymous);
        Self {
            id: cmt.id,
            post_id: cmt.post_id,
            floor: cmt.floor,
            content: cmt.content,
            author_name,
            author_urlname,
            created_at: cmt.created_at,
        }
    }
}

/// Name and profile link shown for the author of a topic or reply.
/// Anonymous entries never link to the profile.
pub fn author_fields(author: Option<&user::Model>, anonymous: bool) -> (String, Option<String>) {
    match author {
        Some(user) => {
            let urlname = if anonymous { None } else { user.urlname.clone() };
            (user.display_name(anonymous).to_string(), urlname)
        }
        None => ("[deleted]".to_string(), None),
    }
}

/// Query parameters for paginated listings
#[derive(Debug, Deserialize, Validate)]
pub struct PageQuery {
    /// Page number (default: 1)
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
}

/// Query parameters accepted by the index page
#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    /// Path to return to after logging in
    pub next: Option<String>,
}

/// Error response
#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
}

/// Health check response
#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}
