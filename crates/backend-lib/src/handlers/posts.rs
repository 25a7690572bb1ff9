// ============================
// crates/backend-lib/src/handlers/posts.rs
// ============================
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use super::{ensure_acceptable, list_limit, ListParams};
use crate::auth::Identity;
use crate::error::AppError;
use crate::store::{NewPost, Post};
use crate::validation::{validate_content, validate_image, validate_title, Validate, Validated, ValidationResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub image: Option<String>,
}

impl Validate for CreatePostRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_title(&self.title)?;
        validate_content(&self.content)?;
        validate_image(self.image.as_deref())
    }
}

/// `GET /posts/latest`
pub async fn latest(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<Post>>, AppError> {
    let limit = list_limit(params)?;
    Ok(Json(state.store.latest_posts(limit).await?))
}

/// `GET /posts/top`
pub async fn top(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<Post>>, AppError> {
    let limit = list_limit(params)?;
    Ok(Json(state.store.top_posts(limit).await?))
}

/// `POST /posts/create`
pub async fn create(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Validated(req): Validated<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), AppError> {
    let principal = identity.require_user()?;
    ensure_acceptable(&state, &[&req.title, &req.content]).await?;

    let post = state
        .store
        .create_post(NewPost {
            title: req.title.trim().to_string(),
            content: req.content,
            image: req.image,
            author_id: principal.user_id.clone(),
        })
        .await?;

    tracing::info!(post_id = %post.id, user_id = %principal.user_id, "created post");
    Ok((StatusCode::CREATED, Json(post)))
}

/// `POST /posts/{id}/like`
pub async fn like(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(post_id): Path<String>,
) -> Result<Json<Post>, AppError> {
    identity.require_user()?;
    Ok(Json(state.store.like_post(&post_id).await?))
}
