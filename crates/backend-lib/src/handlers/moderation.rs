// ============================
// crates/backend-lib/src/handlers/moderation.rs
// ============================
use axum::{extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;

use crate::moderation::{moderate_content, ModerationVerdict};
use crate::validation::{validate_content, Validate, Validated, ValidationResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ModerateRequest {
    pub text: String,
}

impl Validate for ModerateRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_content(&self.text)?;
        Ok(())
    }
}

/// `POST /moderate`: classify a text, failing open
pub async fn moderate(
    State(state): State<Arc<AppState>>,
    Validated(req): Validated<ModerateRequest>,
) -> Json<ModerationVerdict> {
    Json(moderate_content(state.moderator.as_ref(), &req.text).await)
}
