// ============================
// crates/backend-lib/src/store/mod.rs
// ============================
//! Datastore abstraction and the row types the endpoints shape into JSON.
use async_trait::async_trait;
use campus_common::Role;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AppError;

mod sqlite;

pub use sqlite::SqliteStore;

/// A stored account, including its credential hash
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Public projection of a user
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub permissions: Vec<String>,
}

impl From<UserRecord> for UserSummary {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            permissions: user.permissions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Community {
    pub id: String,
    pub name: String,
    pub description: String,
    pub image: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub deadline: DateTime<Utc>,
    pub location: String,
    pub capacity: i64,
    pub registered: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub author_id: String,
    pub likes: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct NewCommunity {
    pub name: String,
    pub description: String,
    pub image: Option<String>,
    pub created_by: String,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub deadline: DateTime<Utc>,
    pub location: String,
    pub capacity: i64,
    pub created_by: String,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub author_id: String,
}

/// Relational datastore behind the resource endpoints.
///
/// Each endpoint issues a single call; implementations bound every call by
/// their own timeout policy.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Insert a user. A duplicate email is a validation failure.
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, AppError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError>;

    async fn find_user(&self, id: &str) -> Result<Option<UserRecord>, AppError>;

    /// Every user, ordered by name
    async fn list_users(&self) -> Result<Vec<UserSummary>, AppError>;

    /// Replace a user's permission set, optionally changing the role
    async fn update_user_permissions(
        &self,
        user_id: &str,
        role: Option<Role>,
        permissions: &[String],
    ) -> Result<UserSummary, AppError>;

    /// Every community, ordered by name
    async fn list_communities(&self) -> Result<Vec<Community>, AppError>;

    async fn create_community(&self, community: NewCommunity) -> Result<Community, AppError>;

    /// Newest events first
    async fn latest_events(&self, limit: u32) -> Result<Vec<Event>, AppError>;

    /// Events whose deadline is after `now`, soonest first
    async fn upcoming_events(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<Event>, AppError>;

    async fn create_event(&self, event: NewEvent) -> Result<Event, AppError>;

    /// Register a user for an event, respecting its capacity
    async fn register_for_event(&self, event_id: &str, user_id: &str) -> Result<Event, AppError>;

    /// Mark a registration as checked in
    async fn check_in(&self, event_id: &str, user_id: &str) -> Result<(), AppError>;

    /// Number of checked-in registrations for an event
    async fn checked_in_count(&self, event_id: &str) -> Result<i64, AppError>;

    /// Newest posts first
    async fn latest_posts(&self, limit: u32) -> Result<Vec<Post>, AppError>;

    /// Most liked posts first
    async fn top_posts(&self, limit: u32) -> Result<Vec<Post>, AppError>;

    async fn create_post(&self, post: NewPost) -> Result<Post, AppError>;

    async fn like_post(&self, post_id: &str) -> Result<Post, AppError>;
}
