// ============================
// crates/backend-lib/src/handlers/uploads.rs
// ============================
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::Identity;
use crate::error::AppError;
use crate::AppState;

/// Multipart field carrying the file
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub path: String,
}

/// `POST /upload`
///
/// Nothing is written unless a non-empty `file` field is present.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let principal = identity.require_user()?;
    let mut multipart = multipart.map_err(|rejection| AppError::Validation(rejection.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;

        if bytes.is_empty() {
            return Err(AppError::Validation("Uploaded file is empty".to_string()));
        }

        let path = state.files.store(&file_name, &bytes).await?;
        tracing::info!(user_id = %principal.user_id, %path, "upload accepted");
        return Ok(Json(UploadResponse { path }));
    }

    Err(AppError::Validation("No file provided".to_string()))
}
