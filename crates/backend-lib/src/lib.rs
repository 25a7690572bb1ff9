// ============================
// crates/backend-lib/src/lib.rs
// ============================
//! Core functionality for the campus community server.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod moderation;
pub mod relay;
pub mod router;
pub mod store;
pub mod uploads;
pub mod validation;
pub mod ws_router;

use anyhow::Context;
use std::sync::Arc;

use crate::auth::{AuthService, DefaultAuth, SessionManager};
use crate::config::Settings;
use crate::middleware::RouteGuard;
use crate::moderation::Moderator;
use crate::relay::RoomRelay;
use crate::store::{Datastore, SqliteStore};
use crate::uploads::{FileStore, LocalFileStore};

pub use router::create_router;

/// Application state shared across all handlers
pub struct AppState {
    /// Settings loaded at startup
    pub settings: Arc<Settings>,
    /// Authentication service
    pub auth: Arc<dyn AuthService>,
    /// Session manager backing `auth`
    pub sessions: SessionManager,
    pub store: Arc<dyn Datastore>,
    pub moderator: Arc<dyn Moderator>,
    pub files: Arc<dyn FileStore>,
    /// Realtime room relay
    pub relay: RoomRelay,
    pub guard: RouteGuard,
}

impl AppState {
    /// Assemble state around already-connected collaborators
    pub fn new(
        settings: Settings,
        store: Arc<dyn Datastore>,
        moderator: Arc<dyn Moderator>,
        files: Arc<dyn FileStore>,
    ) -> Self {
        let sessions = SessionManager::new(settings.session.ttl());
        let auth = Arc::new(DefaultAuth::new(sessions.clone()));
        let relay = RoomRelay::start(settings.relay.clone());
        let guard = RouteGuard::new(&settings.routes);

        Self {
            settings: Arc::new(settings),
            auth,
            sessions,
            store,
            moderator,
            files,
            relay,
            guard,
        }
    }

    /// Connect every collaborator named by `settings`
    pub async fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let store = SqliteStore::connect(&settings.database)
            .await
            .with_context(|| format!("failed to open database {}", settings.database.url))?;
        let moderator = moderation::from_settings(&settings.moderation);
        let files = LocalFileStore::from_settings(&settings.uploads).with_context(|| {
            format!("failed to prepare upload directory {}", settings.uploads.dir.display())
        })?;

        Ok(Self::new(settings, Arc::new(store), moderator, Arc::new(files)))
    }
}
