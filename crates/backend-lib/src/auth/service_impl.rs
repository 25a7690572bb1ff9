use crate::auth::{AuthService, Identity, Principal, Session, SessionManager};
use async_trait::async_trait;
use campus_common::Role;

/// In-process auth backed by [`SessionManager`]
pub struct DefaultAuth {
    sm: SessionManager,
}

impl DefaultAuth {
    pub fn new(sm: SessionManager) -> Self {
        Self { sm }
    }
}

#[async_trait]
impl AuthService for DefaultAuth {
    async fn current_session(&self, token: Option<&str>) -> Identity {
        let Some(token) = token else {
            return Identity::Anonymous;
        };

        match self.sm.get(token).await {
            Some(session) => Identity::Authenticated(Principal::from(&session)),
            None => {
                tracing::debug!("unknown or expired session token");
                Identity::Anonymous
            },
        }
    }

    async fn issue_session(&self, user_id: &str, role: Role, permissions: Vec<String>) -> Session {
        self.sm
            .create_session(user_id.to_string(), role, permissions)
            .await
    }

    async fn revoke_session(&self, token: &str) -> bool {
        self.sm.revoke(token).await
    }
}
