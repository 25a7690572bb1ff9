// ============================
// crates/backend-lib/src/auth/gate.rs
// ============================
//! Session Gate: resolves who is making a request.
//!
//! Resolution never fails. A missing, unknown or expired token resolves to
//! [`Identity::Anonymous`]; role checks are made against the resolved value.
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use campus_common::Role;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;

use super::Session;
use crate::error::AppError;
use crate::AppState;

/// An authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub user_id: String,
    pub role: Role,
    pub permissions: Vec<String>,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<&Session> for Principal {
    fn from(session: &Session) -> Self {
        Self {
            user_id: session.user_id.clone(),
            role: session.role,
            permissions: session.permissions.clone(),
        }
    }
}

/// Result of resolving a request's credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    Authenticated(Principal),
}

/// Boundary-agnostic outcome of a role check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Permitted,
    Denied,
}

/// Admin-only operations are permitted for admin sessions only
pub fn authorize_admin(identity: &Identity) -> Authorization {
    match identity {
        Identity::Authenticated(principal) if principal.is_admin() => Authorization::Permitted,
        _ => Authorization::Denied,
    }
}

impl Identity {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Identity::Authenticated(principal) => Some(principal),
            Identity::Anonymous => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal().is_some()
    }

    /// Any valid session
    pub fn require_user(&self) -> Result<&Principal, AppError> {
        self.principal()
            .ok_or_else(|| AppError::AuthDenied("Authentication required".to_string()))
    }

    /// A valid admin session
    pub fn require_admin(&self) -> Result<&Principal, AppError> {
        match (authorize_admin(self), self.principal()) {
            (Authorization::Permitted, Some(principal)) => Ok(principal),
            _ => Err(AppError::AuthDenied("Admin access required".to_string())),
        }
    }
}

/// Pull the session token from `Authorization: Bearer` or the session cookie
pub fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

impl FromRequestParts<Arc<AppState>> for Identity {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        // The route guard may already have resolved this request
        if let Some(identity) = parts.extensions.get::<Identity>() {
            return Ok(identity.clone());
        }

        let token = session_token(&parts.headers, &state.settings.session.cookie_name);
        let identity = state.auth.current_session(token.as_deref()).await;
        parts.extensions.insert(identity.clone());
        Ok(identity)
    }
}
