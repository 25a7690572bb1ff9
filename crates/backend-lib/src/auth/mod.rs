// ============================
// crates/backend-lib/src/auth/mod.rs
// ============================
//! Authentication: sessions, password hashing and the Session Gate.

pub mod gate;
pub mod password;
pub mod session;
pub mod tokens;
mod service;
mod service_impl;

pub use gate::{authorize_admin, session_token, Authorization, Identity, Principal};
pub use password::{hash_password, verify_password};
pub use session::{Session, SessionManager, MAX_SESSION_TTL};
pub use service::AuthService;
pub use service_impl::DefaultAuth;
