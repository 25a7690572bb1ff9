// ============================
// crates/backend-lib/src/handlers/mod.rs
// ============================
//! Resource endpoints.
//!
//! Every handler takes the resolved [`Identity`](crate::auth::Identity) as an
//! explicit parameter, performs one datastore call and shapes the result.
use axum::extract::{rejection::QueryRejection, Query};
use serde::Deserialize;

use crate::error::AppError;
use crate::moderation::moderate_content;
use crate::AppState;

pub mod admin;
pub mod auth;
pub mod communities;
pub mod events;
pub mod moderation;
pub mod posts;
pub mod uploads;

pub const DEFAULT_LIST_LIMIT: u32 = 10;
pub const MAX_LIST_LIMIT: u32 = 50;

/// `?limit=` on list endpoints
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<u32>,
}

impl ListParams {
    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT)
    }
}

/// Resolve the row limit, turning a bad query string into a 400
pub fn list_limit(params: Result<Query<ListParams>, QueryRejection>) -> Result<u32, AppError> {
    let Query(params) = params.map_err(|rejection| AppError::Validation(rejection.body_text()))?;
    Ok(params.limit())
}

/// Reject user-generated text the moderation collaborator flags
pub(crate) async fn ensure_acceptable(state: &AppState, texts: &[&str]) -> Result<(), AppError> {
    let verdict = moderate_content(state.moderator.as_ref(), &texts.join("\n")).await;
    if verdict.safe {
        return Ok(());
    }

    let categories = verdict.flagged_categories();
    let message = if categories.is_empty() {
        "Content was flagged by moderation".to_string()
    } else {
        format!("Content was flagged by moderation: {}", categories.join(", "))
    };
    Err(AppError::Validation(message))
}

/// Health check endpoint
pub async fn health() -> &'static str {
    "ok"
}
