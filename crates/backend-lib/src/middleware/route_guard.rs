//! Route Guard: per-path session requirement, checked before any handler runs.
//!
//! The policy table is ordered and the first matching pattern wins. A path no
//! pattern matches is allowed. Patterns are matched segment by segment: `*`
//! matches exactly one segment and a trailing `**` matches any remainder.
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::session_token;
use crate::config::RouteGuardSettings;
use crate::AppState;

/// One row of the policy table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutePolicy {
    pub pattern: String,
    pub requires_auth: bool,
}

impl RoutePolicy {
    pub fn protected(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            requires_auth: true,
        }
    }

    pub fn public(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            requires_auth: false,
        }
    }

    /// Table used when configuration supplies none
    pub fn default_table() -> Vec<Self> {
        vec![
            Self::protected("/admin/**"),
            Self::protected("/events/create"),
            Self::protected("/events/*/register"),
            Self::protected("/events/*/check-in"),
            Self::protected("/posts/create"),
            Self::protected("/posts/*/like"),
            Self::protected("/communities/create"),
            Self::protected("/upload"),
            Self::protected("/profile/**"),
        ]
    }

    pub fn matches(&self, path: &str) -> bool {
        let mut pattern = segments(&self.pattern);
        let mut path = segments(path);

        loop {
            match (pattern.next(), path.next()) {
                (Some("**"), _) => return true,
                (Some("*"), Some(_)) => {},
                (Some(expected), Some(actual)) if expected == actual => {},
                (None, None) => return true,
                _ => return false,
            }
        }
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// Outcome of a guard check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Deny,
}

/// Immutable policy table loaded at startup
#[derive(Debug, Clone)]
pub struct RouteGuard {
    policies: Arc<[RoutePolicy]>,
    login_path: String,
}

impl RouteGuard {
    pub fn new(settings: &RouteGuardSettings) -> Self {
        Self {
            policies: settings.policies.clone().into(),
            login_path: settings.login_path.clone(),
        }
    }

    /// First policy whose pattern matches `path`
    pub fn policy_for(&self, path: &str) -> Option<&RoutePolicy> {
        self.policies.iter().find(|policy| policy.matches(path))
    }

    /// Pure decision from (path, session presence)
    pub fn decide(&self, path: &str, has_session: bool) -> GuardDecision {
        match self.policy_for(path) {
            Some(policy) if policy.requires_auth && !has_session => GuardDecision::Deny,
            _ => GuardDecision::Allow,
        }
    }

    /// Login URL carrying `target` (path and query) as `callbackUrl`
    pub fn login_redirect(&self, target: &str) -> String {
        format!("{}?callbackUrl={}", self.login_path, encode_query_value(target))
    }
}

/// Percent-encode everything but unreserved characters and `/`
fn encode_query_value(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' => {
                encoded.push(char::from(byte))
            },
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

/// Middleware applying the guard to every request.
///
/// The resolved identity is stored in request extensions so handlers do not
/// resolve the session a second time.
pub async fn route_guard(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let token = session_token(request.headers(), &state.settings.session.cookie_name);
    let identity = state.auth.current_session(token.as_deref()).await;

    match state.guard.decide(&path, identity.is_authenticated()) {
        GuardDecision::Allow => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        },
        GuardDecision::Deny => {
            let target = request
                .uri()
                .path_and_query()
                .map_or(path.as_str(), |target| target.as_str());
            tracing::debug!(%target, "route guard redirecting anonymous request");
            Redirect::temporary(&state.guard.login_redirect(target)).into_response()
        },
    }
}
