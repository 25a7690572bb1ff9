// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Request validation.
//!
//! Every request body has an explicit schema (a `Deserialize` struct) and a
//! [`Validate`] implementation. The [`Validated`] extractor runs both and
//! fails closed with [`AppError::Validation`].

use axum::{
    extract::{FromRequest, Request},
    Json,
};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::LazyLock;
use thiserror::Error;

use crate::config::PasswordRequirements;
use crate::error::AppError;

// Common validation constants
const MAX_NAME_LENGTH: usize = 100;
const MAX_TITLE_LENGTH: usize = 200;
const MAX_CONTENT_LENGTH: usize = 10_000;
const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321 SMTP limit
const MAX_PASSWORD_LENGTH: usize = 128;
const MAX_IMAGE_LENGTH: usize = 2048;
const MAX_ROOM_ID_LENGTH: usize = 128;
const MAX_PERMISSIONS: usize = 64;
const MAX_CAPACITY: i64 = 100_000;
const MAX_LOCATION_LENGTH: usize = 200;

// Regex patterns for validation
static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());
static PERMISSION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_:.-]{0,63}$").unwrap());

/// Possible validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    #[error("Invalid title: {0}")]
    InvalidTitle(String),

    #[error("Invalid content: {0}")]
    InvalidContent(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Invalid room ID: {0}")]
    InvalidRoomId(String),

    #[error("Invalid permissions: {0}")]
    InvalidPermissions(String),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Shape check run after a body deserialized successfully
pub trait Validate {
    fn validate(&self) -> ValidationResult<()>;
}

/// JSON body extractor that deserializes then validates.
pub struct Validated<T>(pub T);

impl<S, T> FromRequest<S> for Validated<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

fn check_text(
    value: &str,
    max: usize,
    what: &str,
    err: fn(String) -> ValidationError,
) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(err(format!("{what} must not be empty")));
    }
    if value.chars().count() > max {
        return Err(err(format!("{what} must be at most {max} characters")));
    }
    Ok(())
}

/// Validate a display name (users, communities)
pub fn validate_name(name: &str) -> ValidationResult<&str> {
    check_text(name, MAX_NAME_LENGTH, "Name", ValidationError::InvalidName)?;
    Ok(name)
}

/// Validate a title
pub fn validate_title(title: &str) -> ValidationResult<&str> {
    check_text(title, MAX_TITLE_LENGTH, "Title", ValidationError::InvalidTitle)?;
    Ok(title)
}

/// Validate free-form content
pub fn validate_content(content: &str) -> ValidationResult<&str> {
    check_text(
        content,
        MAX_CONTENT_LENGTH,
        "Content",
        ValidationError::InvalidContent,
    )?;
    Ok(content)
}

/// Validate an email address
pub fn validate_email(email: &str) -> ValidationResult<&str> {
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::InvalidEmail(format!(
            "Email cannot exceed {MAX_EMAIL_LENGTH} characters"
        )));
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::InvalidEmail(
            "Email address is not well formed".to_string(),
        ));
    }

    Ok(email)
}

/// Validate a password against the configured complexity requirements
pub fn validate_password<'a>(
    password: &'a str,
    requirements: &PasswordRequirements,
) -> ValidationResult<&'a str> {
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::InvalidPassword(format!(
            "Password cannot exceed {MAX_PASSWORD_LENGTH} characters"
        )));
    }

    if !requirements.is_satisfied_by(password) {
        return Err(ValidationError::InvalidPassword(requirements.describe()));
    }

    Ok(password)
}

/// Validate an optional image reference (upload path or absolute URL)
pub fn validate_image(image: Option<&str>) -> ValidationResult<()> {
    let Some(image) = image else {
        return Ok(());
    };

    if image.len() > MAX_IMAGE_LENGTH {
        return Err(ValidationError::InvalidImage(format!(
            "Image reference cannot exceed {MAX_IMAGE_LENGTH} characters"
        )));
    }

    let allowed = image.starts_with('/')
        || image.starts_with("https://")
        || image.starts_with("http://");
    if !allowed {
        return Err(ValidationError::InvalidImage(
            "Image must be an upload path or an http(s) URL".to_string(),
        ));
    }

    Ok(())
}

/// Validate a relay room identifier
pub fn validate_room_id(room_id: &str) -> ValidationResult<&str> {
    if room_id.trim().is_empty() {
        return Err(ValidationError::InvalidRoomId(
            "Room ID must not be empty".to_string(),
        ));
    }

    if room_id.chars().count() > MAX_ROOM_ID_LENGTH {
        return Err(ValidationError::InvalidRoomId(format!(
            "Room ID must be at most {MAX_ROOM_ID_LENGTH} characters"
        )));
    }

    if room_id.chars().any(char::is_control) {
        return Err(ValidationError::InvalidRoomId(
            "Room ID contains control characters".to_string(),
        ));
    }

    Ok(room_id)
}

/// Validate a permission set
pub fn validate_permissions(permissions: &[String]) -> ValidationResult<()> {
    if permissions.len() > MAX_PERMISSIONS {
        return Err(ValidationError::InvalidPermissions(format!(
            "At most {MAX_PERMISSIONS} permissions may be granted"
        )));
    }

    if let Some(bad) = permissions.iter().find(|p| !PERMISSION_REGEX.is_match(p)) {
        return Err(ValidationError::InvalidPermissions(format!(
            "'{bad}' is not a valid permission name"
        )));
    }

    Ok(())
}

/// Validate an event location
pub fn validate_location(location: &str) -> ValidationResult<&str> {
    check_text(
        location,
        MAX_LOCATION_LENGTH,
        "Location",
        ValidationError::InvalidEvent,
    )?;
    Ok(location)
}

/// Registration deadline must lie after `now`
pub fn validate_deadline(
    deadline: DateTime<Utc>,
    now: DateTime<Utc>,
) -> ValidationResult<DateTime<Utc>> {
    if deadline <= now {
        return Err(ValidationError::InvalidEvent(
            "Deadline must be in the future".to_string(),
        ));
    }
    Ok(deadline)
}

/// Validate an event capacity
pub fn validate_capacity(capacity: i64) -> ValidationResult<i64> {
    if !(1..=MAX_CAPACITY).contains(&capacity) {
        return Err(ValidationError::InvalidEvent(format!(
            "Capacity must be between 1 and {MAX_CAPACITY}"
        )));
    }
    Ok(capacity)
}
