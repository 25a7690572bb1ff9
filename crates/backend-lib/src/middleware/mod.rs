// crates/backend-lib/src/middleware/mod.rs

//! Middleware for the campus server.

pub mod route_guard;

pub use route_guard::{route_guard, GuardDecision, RouteGuard, RoutePolicy};
