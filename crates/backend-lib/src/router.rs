// ============================
// crates/backend-lib/src/router.rs
// ============================
//! HTTP router assembly.
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::handlers::{self, admin, auth, communities, events, moderation, posts, uploads};
use crate::middleware::route_guard;
use crate::ws_router;
use crate::AppState;

/// Build the full application router.
///
/// The route guard wraps every route, including the relay endpoint and the
/// static upload directory.
pub fn create_router(state: Arc<AppState>) -> Router {
    let settings = state.settings.clone();

    Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/session", get(auth::session))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/permissions", patch(admin::update_permissions))
        .route("/communities", get(communities::list))
        .route("/communities/create", post(communities::create))
        .route("/events/latest", get(events::latest))
        .route("/events/upcoming", get(events::upcoming))
        .route("/events/create", post(events::create))
        .route("/events/{id}/register", post(events::register))
        .route("/events/{id}/check-in", post(events::check_in))
        .route("/events/{id}/check-in/count", get(events::check_in_count))
        .route("/posts/latest", get(posts::latest))
        .route("/posts/top", get(posts::top))
        .route("/posts/create", post(posts::create))
        .route("/posts/{id}/like", post(posts::like))
        .route("/moderate", post(moderation::moderate))
        .route(
            "/upload",
            post(uploads::upload).layer(DefaultBodyLimit::max(settings.uploads.max_bytes)),
        )
        .merge(ws_router::routes(&settings.relay.path))
        .nest_service(
            &settings.uploads.public_prefix,
            ServeDir::new(&settings.uploads.dir),
        )
        .layer(middleware::from_fn_with_state(state.clone(), route_guard))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
