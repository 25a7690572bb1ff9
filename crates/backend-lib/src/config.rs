// ============================
// crates/backend-lib/src/config.rs
// ============================
//! Configuration management.
//!
//! Settings are layered with figment: built-in defaults, then an optional
//! TOML file, then `CAMPUS_`-prefixed environment variables (nested keys
//! separated by `__`, e.g. `CAMPUS_RELAY__ECHO_TO_SENDER=false`).
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::auth::MAX_SESSION_TTL;
use crate::middleware::RoutePolicy;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "CAMPUS_";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Rejected configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Log level used when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Accounts registered with these emails are created as admins
    pub admin_emails: Vec<String>,
    pub database: DatabaseSettings,
    pub session: SessionSettings,
    /// Password requirements for new accounts
    pub password: PasswordRequirements,
    pub moderation: ModerationSettings,
    pub uploads: UploadSettings,
    pub relay: RelaySettings,
    pub routes: RouteGuardSettings,
}

/// Relational datastore connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite connection URL
    pub url: String,
    pub max_connections: u32,
    /// Upper bound on waiting for a pooled connection
    pub acquire_timeout_secs: u64,
}

/// Session issuance and lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Session TTL in seconds
    pub ttl_secs: u64,
    /// Cookie carrying the session token
    pub cookie_name: String,
    /// How often expired sessions are purged
    pub cleanup_interval_secs: u64,
}

/// Password complexity requirements
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordRequirements {
    /// Minimum password length
    pub min_length: usize,
    /// Require uppercase letters
    pub require_uppercase: bool,
    /// Require lowercase letters
    pub require_lowercase: bool,
    /// Require digits
    pub require_digit: bool,
    /// Require special characters
    pub require_special: bool,
}

/// Third-party text classification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationSettings {
    pub endpoint: String,
    /// Moderation is disabled when no key is configured
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

/// Upload storage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    /// Directory uploads are written to
    pub dir: PathBuf,
    /// URL prefix uploads are served under
    pub public_prefix: String,
    /// Maximum accepted request body for uploads
    pub max_bytes: usize,
}

/// Realtime room relay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Path of the WebSocket endpoint
    pub path: String,
    /// Deliver a sender's own messages back to it
    pub echo_to_sender: bool,
    /// Drop a room entry once its last member leaves
    pub evict_empty_rooms: bool,
    /// Refuse anonymous connections
    pub require_session: bool,
}

/// Request-time route protection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteGuardSettings {
    /// Where denied requests are redirected
    pub login_path: String,
    /// Ordered policy table; first match wins
    pub policies: Vec<RoutePolicy>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            log_level: "info".to_string(),
            log_json: false,
            admin_emails: Vec::new(),
            database: DatabaseSettings::default(),
            session: SessionSettings::default(),
            password: PasswordRequirements::default(),
            moderation: ModerationSettings::default(),
            uploads: UploadSettings::default(),
            relay: RelaySettings::default(),
            routes: RouteGuardSettings::default(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite://data/campus.db".to_string(),
            max_connections: 5,
            acquire_timeout_secs: 5,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 60 * 60 * 24 * 7, // 7 days
            cookie_name: "campus_session".to_string(),
            cleanup_interval_secs: 15 * 60,
        }
    }
}

impl Default for PasswordRequirements {
    fn default() -> Self {
        Self {
            min_length: 10,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
        }
    }
}

impl Default for ModerationSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/moderations".to_string(),
            api_key: None,
            timeout_secs: 5,
        }
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/uploads"),
            public_prefix: "/uploads".to_string(),
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            path: "/ws".to_string(),
            echo_to_sender: true,
            evict_empty_rooms: true,
            require_session: false,
        }
    }
}

impl Default for RouteGuardSettings {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            policies: RoutePolicy::default_table(),
        }
    }
}

impl PasswordRequirements {
    /// Check if a password meets the complexity requirements
    pub fn is_satisfied_by(&self, password: &str) -> bool {
        if password.chars().count() < self.min_length {
            return false;
        }

        if self.require_uppercase && !password.chars().any(char::is_uppercase) {
            return false;
        }

        if self.require_lowercase && !password.chars().any(char::is_lowercase) {
            return false;
        }

        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            return false;
        }

        if self.require_special && !password.chars().any(|c| !c.is_alphanumeric()) {
            return false;
        }

        true
    }

    /// Human readable summary used in rejection messages
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if self.require_uppercase {
            parts.push("an uppercase letter");
        }
        if self.require_lowercase {
            parts.push("a lowercase letter");
        }
        if self.require_digit {
            parts.push("a digit");
        }
        if self.require_special {
            parts.push("a special character");
        }

        if parts.is_empty() {
            format!("Password must be at least {} characters", self.min_length)
        } else {
            format!(
                "Password must be at least {} characters and contain {}",
                self.min_length,
                parts.join(", ")
            )
        }
    }
}

impl SessionSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

impl Settings {
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|admin| admin.trim().eq_ignore_ascii_case(email.trim()))
    }

    /// Load settings from defaults, `path` (if present) and the environment
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let settings: Settings = Self::figment(path)
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Provider stack, exposed so callers can layer extra overrides
    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "log_level must be one of {LOG_LEVELS:?}, got '{}'",
                self.log_level
            )));
        }

        if self.session.ttl_secs == 0 {
            return Err(ConfigError::Invalid("session.ttl_secs must be positive".to_string()));
        }

        if self.session.ttl() > MAX_SESSION_TTL {
            return Err(ConfigError::Invalid(format!(
                "session.ttl_secs must be at most {}",
                MAX_SESSION_TTL.as_secs()
            )));
        }

        if self.session.cleanup_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "session.cleanup_interval_secs must be positive".to_string(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be positive".to_string(),
            ));
        }

        if self.uploads.max_bytes == 0 {
            return Err(ConfigError::Invalid("uploads.max_bytes must be positive".to_string()));
        }

        if self.password.min_length < 8 {
            return Err(ConfigError::Invalid(
                "password.min_length must be at least 8".to_string(),
            ));
        }

        if !self.relay.path.starts_with('/') {
            return Err(ConfigError::Invalid("relay.path must start with '/'".to_string()));
        }

        if !self.uploads.public_prefix.starts_with('/') {
            return Err(ConfigError::Invalid(
                "uploads.public_prefix must start with '/'".to_string(),
            ));
        }

        if let Some(policy) = self.routes.policies.iter().find(|p| !p.pattern.starts_with('/')) {
            return Err(ConfigError::Invalid(format!(
                "route pattern '{}' must start with '/'",
                policy.pattern
            )));
        }

        Ok(())
    }
}
