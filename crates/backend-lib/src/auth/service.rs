use async_trait::async_trait;
use campus_common::Role;

use super::{Identity, Session};

/// Auth collaborator seam: issues sessions and resolves tokens.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Resolve a credential token. Never fails: missing, unknown and expired
    /// tokens all resolve to [`Identity::Anonymous`].
    async fn current_session(&self, token: Option<&str>) -> Identity;
    /// Issue a session for an authenticated user (login)
    async fn issue_session(&self, user_id: &str, role: Role, permissions: Vec<String>) -> Session;
    /// Invalidate a session (logout)
    async fn revoke_session(&self, token: &str) -> bool;
}
