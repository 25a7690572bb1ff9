// ============================
// crates/backend-lib/src/handlers/admin.rs
// ============================
//! User administration. Admin sessions only.
use axum::{extract::State, Json};
use campus_common::Role;
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::Identity;
use crate::error::AppError;
use crate::store::UserSummary;
use crate::validation::{validate_permissions, Validate, Validated, ValidationError, ValidationResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePermissionsRequest {
    pub user_id: String,
    #[serde(default)]
    pub role: Option<Role>,
    pub permissions: Vec<String>,
}

impl Validate for UpdatePermissionsRequest {
    fn validate(&self) -> ValidationResult<()> {
        if self.user_id.trim().is_empty() {
            return Err(ValidationError::InvalidPermissions(
                "userId is required".to_string(),
            ));
        }
        validate_permissions(&self.permissions)
    }
}

/// `GET /admin/users`
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<Vec<UserSummary>>, AppError> {
    identity.require_admin()?;
    Ok(Json(state.store.list_users().await?))
}

/// `PATCH /admin/users/permissions`
pub async fn update_permissions(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Validated(req): Validated<UpdatePermissionsRequest>,
) -> Result<Json<UserSummary>, AppError> {
    let admin = identity.require_admin()?;

    let user = state
        .store
        .update_user_permissions(&req.user_id, req.role, &req.permissions)
        .await?;

    tracing::info!(
        admin_id = %admin.user_id,
        user_id = %user.id,
        role = user.role.as_str(),
        permissions = ?user.permissions,
        "updated user permissions"
    );
    Ok(Json(user))
}
