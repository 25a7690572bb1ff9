// ============================
// crates/backend-lib/src/store/sqlite.rs
// ============================
//! SQLite implementation of [`Datastore`] on sqlx.
use async_trait::async_trait;
use campus_common::Role;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use super::{
    Community, Datastore, Event, NewCommunity, NewEvent, NewPost, NewUser, Post, UserRecord,
    UserSummary,
};
use crate::config::DatabaseSettings;
use crate::error::AppError;

static MEMDB_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect using the configured URL and apply migrations
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(&settings.url)?.create_if_missing(true);

        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    tracing::warn!(path = %parent.display(), error = %e, "failed to create database directory");
                }
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
            .connect_with(options)
            .await?;

        info!(url = %settings.url, "database connected");
        Self::from_pool(pool).await
    }

    /// Private in-memory database, used by tests and ephemeral runs
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        // A plain `:memory:` database is per-connection; name each one so
        // parallel tests never share state.
        let id = MEMDB_COUNTER.fetch_add(1, Ordering::Relaxed);
        let uri = format!(
            "file:campus-memdb-{}-{}?mode=memory&cache=shared",
            std::process::id(),
            id
        );

        let options = SqliteConnectOptions::new()
            .filename(&uri)
            .shared_cache(true)
            .create_if_missing(true);

        // The database lives only as long as its one connection
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("database migrations checked/applied");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    permissions: String,
    created_at: i64,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role: Role::parse(&row.role).unwrap_or_default(),
            permissions: serde_json::from_str(&row.permissions).unwrap_or_default(),
            created_at: from_millis(row.created_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct CommunityRow {
    id: String,
    name: String,
    description: String,
    image: Option<String>,
    created_by: String,
    created_at: i64,
}

impl From<CommunityRow> for Community {
    fn from(row: CommunityRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            image: row.image,
            created_by: row.created_by,
            created_at: from_millis(row.created_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: String,
    title: String,
    content: String,
    image: Option<String>,
    deadline: i64,
    location: String,
    capacity: i64,
    registered: i64,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            content: row.content,
            image: row.image,
            deadline: from_millis(row.deadline),
            location: row.location,
            capacity: row.capacity,
            registered: row.registered,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PostRow {
    id: String,
    title: String,
    content: String,
    image: Option<String>,
    author_id: String,
    likes: i64,
    created_at: i64,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            content: row.content,
            image: row.image,
            author_id: row.author_id,
            likes: row.likes,
            created_at: from_millis(row.created_at),
        }
    }
}

#[async_trait]
impl Datastore for SqliteStore {
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, AppError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp_millis();

        let result = sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, permissions, created_at)
            VALUES (?, ?, ?, ?, ?, '[]', ?)
            "#,
        )
        .bind(&id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Err(e) if is_unique_violation(&e) => {
                return Err(AppError::Validation("Email is already registered".to_string()))
            },
            Err(e) => return Err(e.into()),
            Ok(_) => {},
        }

        Ok(UserRecord {
            id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            permissions: Vec::new(),
            created_at: from_millis(now),
        })
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, name, email, password_hash, role, permissions, created_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn find_user(&self, id: &str) -> Result<Option<UserRecord>, AppError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, name, email, password_hash, role, permissions, created_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list_users(&self) -> Result<Vec<UserSummary>, AppError> {
        let rows: Vec<UserRow> = sqlx::query_as(
            r#"
            SELECT id, name, email, password_hash, role, permissions, created_at
            FROM users
            ORDER BY name ASC, rowid ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| UserRecord::from(row).into())
            .collect())
    }

    async fn update_user_permissions(
        &self,
        user_id: &str,
        role: Option<Role>,
        permissions: &[String],
    ) -> Result<UserSummary, AppError> {
        let permissions = serde_json::to_string(permissions)
            .map_err(|e| AppError::Internal(format!("failed to encode permissions: {e}")))?;

        let row: Option<UserRow> = sqlx::query_as(
            r#"
            UPDATE users
            SET permissions = ?, role = COALESCE(?, role)
            WHERE id = ?
            RETURNING id, name, email, password_hash, role, permissions, created_at
            "#,
        )
        .bind(permissions)
        .bind(role.map(Role::as_str))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| UserRecord::from(row).into())
            .ok_or_else(|| AppError::NotFound("User".to_string()))
    }

    async fn list_communities(&self) -> Result<Vec<Community>, AppError> {
        let rows: Vec<CommunityRow> = sqlx::query_as(
            r#"
            SELECT id, name, description, image, created_by, created_at
            FROM communities
            ORDER BY name ASC, rowid ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_community(&self, community: NewCommunity) -> Result<Community, AppError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp_millis();

        sqlx::query(
            r#"
            INSERT INTO communities (id, name, description, image, created_by, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&community.name)
        .bind(&community.description)
        .bind(&community.image)
        .bind(&community.created_by)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Community {
            id,
            name: community.name,
            description: community.description,
            image: community.image,
            created_by: community.created_by,
            created_at: from_millis(now),
        })
    }

    async fn latest_events(&self, limit: u32) -> Result<Vec<Event>, AppError> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r#"
            SELECT id, title, content, image, deadline, location, capacity, registered
            FROM events
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn upcoming_events(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<Event>, AppError> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r#"
            SELECT id, title, content, image, deadline, location, capacity, registered
            FROM events
            WHERE deadline > ?
            ORDER BY deadline ASC, rowid ASC
            LIMIT ?
            "#,
        )
        .bind(now.timestamp_millis())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_event(&self, event: NewEvent) -> Result<Event, AppError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp_millis();
        let deadline = event.deadline.timestamp_millis();

        sqlx::query(
            r#"
            INSERT INTO events
                (id, title, content, image, deadline, location, capacity, registered, created_by, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&event.title)
        .bind(&event.content)
        .bind(&event.image)
        .bind(deadline)
        .bind(&event.location)
        .bind(event.capacity)
        .bind(&event.created_by)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Event {
            id,
            title: event.title,
            content: event.content,
            image: event.image,
            deadline: from_millis(deadline),
            location: event.location,
            capacity: event.capacity,
            registered: 0,
        })
    }

    async fn register_for_event(&self, event_id: &str, user_id: &str) -> Result<Event, AppError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO registrations (event_id, user_id, checked_in, created_at)
            SELECT id, ?, 0, ? FROM events WHERE id = ?
            "#,
        )
        .bind(user_id)
        .bind(Utc::now().timestamp_millis())
        .bind(event_id)
        .execute(&mut *tx)
        .await;

        match inserted {
            Err(e) if is_unique_violation(&e) => {
                return Err(AppError::Validation(
                    "Already registered for this event".to_string(),
                ))
            },
            Err(e) => return Err(e.into()),
            Ok(result) if result.rows_affected() == 0 => {
                return Err(AppError::NotFound("Event".to_string()))
            },
            Ok(_) => {},
        }

        let row: Option<EventRow> = sqlx::query_as(
            r#"
            UPDATE events
            SET registered = registered + 1
            WHERE id = ? AND registered < capacity
            RETURNING id, title, content, image, deadline, location, capacity, registered
            "#,
        )
        .bind(event_id)
        .fetch_optional(&mut *tx)
        .await?;

        // Dropping the transaction rolls back the registration row
        let Some(row) = row else {
            return Err(AppError::Validation("Event is full".to_string()));
        };

        tx.commit().await?;
        Ok(row.into())
    }

    async fn check_in(&self, event_id: &str, user_id: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE registrations SET checked_in = 1 WHERE event_id = ? AND user_id = ?",
        )
        .bind(event_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Registration".to_string()));
        }
        Ok(())
    }

    async fn checked_in_count(&self, event_id: &str) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM registrations WHERE event_id = ? AND checked_in = 1",
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn latest_posts(&self, limit: u32) -> Result<Vec<Post>, AppError> {
        let rows: Vec<PostRow> = sqlx::query_as(
            r#"
            SELECT id, title, content, image, author_id, likes, created_at
            FROM posts
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn top_posts(&self, limit: u32) -> Result<Vec<Post>, AppError> {
        let rows: Vec<PostRow> = sqlx::query_as(
            r#"
            SELECT id, title, content, image, author_id, likes, created_at
            FROM posts
            ORDER BY likes DESC, created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_post(&self, post: NewPost) -> Result<Post, AppError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp_millis();

        sqlx::query(
            r#"
            INSERT INTO posts (id, title, content, image, author_id, likes, created_at)
            VALUES (?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(&id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.image)
        .bind(&post.author_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Post {
            id,
            title: post.title,
            content: post.content,
            image: post.image,
            author_id: post.author_id,
            likes: 0,
            created_at: from_millis(now),
        })
    }

    async fn like_post(&self, post_id: &str) -> Result<Post, AppError> {
        let row: Option<PostRow> = sqlx::query_as(
            r#"
            UPDATE posts
            SET likes = likes + 1
            WHERE id = ?
            RETURNING id, title, content, image, author_id, likes, created_at
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Into::into)
            .ok_or_else(|| AppError::NotFound("Post".to_string()))
    }
}
