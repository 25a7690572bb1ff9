// ============================
// crates/backend-lib/src/auth/password.rs
// ============================
//! Password hashing and verification.
use scrypt::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Scrypt,
};

use std::sync::LazyLock;

use super::tokens::new_session_token;
use crate::error::AppError;

/// Hash of a random secret, verified against when an account does not exist
static DECOY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password(&new_session_token()).ok());

/// Hash a password using scrypt
pub fn hash_password(plain: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Scrypt
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?
        .to_string();
    Ok(hash)
}

/// Verify a password against a hash
pub fn verify_password(hash: &str, plain: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Scrypt.verify_password(plain.as_bytes(), &parsed_hash).is_ok()
}

/// Hash on the blocking pool
pub async fn hash_password_blocking(plain: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&plain)).await?
}

/// Verify on the blocking pool
pub async fn verify_password_blocking(hash: String, plain: String) -> Result<bool, AppError> {
    Ok(tokio::task::spawn_blocking(move || verify_password(&hash, &plain)).await?)
}

/// Spend one verification on the blocking pool without an account
pub async fn verify_decoy_blocking(plain: String) -> Result<(), AppError> {
    tokio::task::spawn_blocking(move || {
        if let Some(hash) = DECOY_HASH.as_deref() {
            let _ = verify_password(hash, &plain);
        }
    })
    .await?;
    Ok(())
}
