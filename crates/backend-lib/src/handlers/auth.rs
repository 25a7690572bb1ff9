// ============================
// crates/backend-lib/src/handlers/auth.rs
// ============================
//! Account registration, login and logout.
use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use campus_common::Role;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::auth::password::{hash_password_blocking, verify_decoy_blocking, verify_password_blocking};
use crate::auth::{session_token, Identity, Principal, MAX_SESSION_TTL};
use crate::error::AppError;
use crate::store::{NewUser, UserSummary};
use crate::validation::{
    validate_email, validate_name, validate_password, Validate, Validated, ValidationError,
    ValidationResult,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_name(&self.name)?;
        validate_email(&self.email)?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_email(&self.email)?;
        if self.password.is_empty() {
            return Err(ValidationError::InvalidPassword(
                "Password is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserSummary,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    #[serde(flatten)]
    pub principal: Option<Principal>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn session_cookie(name: &str, token: &str, max_age_secs: u64) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(&format!(
        "{name}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}"
    ))
    .map_err(|e| AppError::Internal(format!("invalid session cookie: {e}")))
}

/// `POST /auth/register`
pub async fn register(
    State(state): State<Arc<AppState>>,
    Validated(req): Validated<RegisterRequest>,
) -> Result<(StatusCode, Json<UserSummary>), AppError> {
    validate_password(&req.password, &state.settings.password)?;
    let password_hash = hash_password_blocking(req.password).await?;

    let email = normalize_email(&req.email);
    let role = if state.settings.is_admin_email(&email) {
        Role::Admin
    } else {
        Role::User
    };

    let user = state
        .store
        .create_user(NewUser {
            name: req.name.trim().to_string(),
            email,
            password_hash,
            role,
        })
        .await?;

    tracing::info!(user_id = %user.id, role = role.as_str(), "registered user");
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// `POST /auth/login`
pub async fn login(
    State(state): State<Arc<AppState>>,
    Validated(req): Validated<LoginRequest>,
) -> Result<Response, AppError> {
    let invalid = || AppError::AuthDenied("Invalid email or password".to_string());

    let Some(user) = state
        .store
        .find_user_by_email(&normalize_email(&req.email))
        .await?
    else {
        // Same scrypt cost as a real account
        verify_decoy_blocking(req.password).await?;
        return Err(invalid());
    };

    if !verify_password_blocking(user.password_hash.clone(), req.password).await? {
        return Err(invalid());
    }

    let session = state
        .auth
        .issue_session(&user.id, user.role, user.permissions.clone())
        .await;
    tracing::info!(user_id = %user.id, "user logged in");

    let cookie = session_cookie(
        &state.settings.session.cookie_name,
        &session.token,
        state.settings.session.ttl().min(MAX_SESSION_TTL).as_secs(),
    )?;

    let body = LoginResponse {
        token: session.token,
        user: user.into(),
    };
    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// `POST /auth/logout`
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let cookie_name = &state.settings.session.cookie_name;
    if let Some(token) = session_token(&headers, cookie_name) {
        if state.auth.revoke_session(&token).await {
            tracing::debug!("session revoked");
        }
    }

    let cookie = session_cookie(cookie_name, "", 0)?;
    Ok(([(header::SET_COOKIE, cookie)], Json(json!({ "ok": true }))).into_response())
}

/// `GET /auth/session`
pub async fn session(identity: Identity) -> Json<SessionResponse> {
    Json(SessionResponse {
        authenticated: identity.is_authenticated(),
        principal: identity.principal().cloned(),
    })
}
