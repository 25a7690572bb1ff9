// ============================
// crates/backend-lib/src/handlers/communities.rs
// ============================
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use std::sync::Arc;

use super::ensure_acceptable;
use crate::auth::Identity;
use crate::error::AppError;
use crate::store::{Community, NewCommunity};
use crate::validation::{validate_content, validate_image, validate_name, Validate, Validated, ValidationResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCommunityRequest {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
}

impl Validate for CreateCommunityRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_name(&self.name)?;
        validate_content(&self.description)?;
        validate_image(self.image.as_deref())
    }
}

/// `GET /communities`
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Community>>, AppError> {
    Ok(Json(state.store.list_communities().await?))
}

/// `POST /communities/create`
pub async fn create(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Validated(req): Validated<CreateCommunityRequest>,
) -> Result<(StatusCode, Json<Community>), AppError> {
    let principal = identity.require_user()?;
    ensure_acceptable(&state, &[&req.name, &req.description]).await?;

    let community = state
        .store
        .create_community(NewCommunity {
            name: req.name.trim().to_string(),
            description: req.description,
            image: req.image,
            created_by: principal.user_id.clone(),
        })
        .await?;

    tracing::info!(community_id = %community.id, user_id = %principal.user_id, "created community");
    Ok((StatusCode::CREATED, Json(community)))
}
