// ============================
// crates/backend-lib/src/handlers/events.rs
// ============================
//! Events, registrations and check-ins.
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ensure_acceptable, list_limit, ListParams};
use crate::auth::Identity;
use crate::error::AppError;
use crate::store::{Event, NewEvent};
use crate::validation::{
    validate_capacity, validate_content, validate_deadline, validate_image, validate_location,
    validate_title, Validate, Validated, ValidationError, ValidationResult,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub image: Option<String>,
    pub deadline: DateTime<Utc>,
    pub location: String,
    pub capacity: i64,
}

impl Validate for CreateEventRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_title(&self.title)?;
        validate_content(&self.content)?;
        validate_image(self.image.as_deref())?;
        validate_location(&self.location)?;
        validate_capacity(self.capacity)?;
        validate_deadline(self.deadline, Utc::now())?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRequest {
    pub user_id: String,
}

impl Validate for CheckInRequest {
    fn validate(&self) -> ValidationResult<()> {
        if self.user_id.trim().is_empty() {
            return Err(ValidationError::InvalidEvent("userId is required".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInResponse {
    pub event_id: String,
    pub user_id: String,
    pub checked_in: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInCount {
    pub event_id: String,
    pub count: i64,
}

/// `GET /events/latest`
pub async fn latest(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<Event>>, AppError> {
    let limit = list_limit(params)?;
    Ok(Json(state.store.latest_events(limit).await?))
}

/// `GET /events/upcoming`
pub async fn upcoming(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<Event>>, AppError> {
    let limit = list_limit(params)?;
    Ok(Json(state.store.upcoming_events(Utc::now(), limit).await?))
}

/// `POST /events/create`
pub async fn create(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Validated(req): Validated<CreateEventRequest>,
) -> Result<(StatusCode, Json<Event>), AppError> {
    let principal = identity.require_user()?;
    ensure_acceptable(&state, &[&req.title, &req.content]).await?;

    let event = state
        .store
        .create_event(NewEvent {
            title: req.title.trim().to_string(),
            content: req.content,
            image: req.image,
            deadline: req.deadline,
            location: req.location.trim().to_string(),
            capacity: req.capacity,
            created_by: principal.user_id.clone(),
        })
        .await?;

    tracing::info!(event_id = %event.id, user_id = %principal.user_id, "created event");
    Ok((StatusCode::CREATED, Json(event)))
}

/// `POST /events/{id}/register`
pub async fn register(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(event_id): Path<String>,
) -> Result<Json<Event>, AppError> {
    let principal = identity.require_user()?;
    let event = state
        .store
        .register_for_event(&event_id, &principal.user_id)
        .await?;

    tracing::info!(%event_id, user_id = %principal.user_id, "registered for event");
    Ok(Json(event))
}

/// `POST /events/{id}/check-in`
///
/// Admins may check in any registered user; everyone else only themselves.
pub async fn check_in(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(event_id): Path<String>,
    Validated(req): Validated<CheckInRequest>,
) -> Result<Json<CheckInResponse>, AppError> {
    let principal = identity.require_user()?;
    if !principal.is_admin() && principal.user_id != req.user_id {
        return Err(AppError::AuthDenied(
            "Only admins may check in other users".to_string(),
        ));
    }

    state.store.check_in(&event_id, &req.user_id).await?;

    tracing::info!(%event_id, user_id = %req.user_id, by = %principal.user_id, "checked in");
    Ok(Json(CheckInResponse {
        event_id,
        user_id: req.user_id,
        checked_in: true,
    }))
}

/// `GET /events/{id}/check-in/count`
pub async fn check_in_count(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> Result<Json<CheckInCount>, AppError> {
    let count = state.store.checked_in_count(&event_id).await?;
    Ok(Json(CheckInCount { event_id, count }))
}
