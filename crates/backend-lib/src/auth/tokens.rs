//! Random identifiers drawn from OS entropy.
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};

/// 256 bits per session token
const SESSION_TOKEN_BYTES: usize = 32;

fn random_bytes(len: usize) -> Vec<u8> {
    let mut buffer = vec![0u8; len];
    OsRng.fill_bytes(&mut buffer);
    buffer
}

/// Opaque bearer/cookie value, URL-safe base64 without padding
pub fn new_session_token() -> String {
    URL_SAFE_NO_PAD.encode(random_bytes(SESSION_TOKEN_BYTES))
}

/// Lowercase hex tag of `len` random bytes
pub fn random_hex(len: usize) -> String {
    random_bytes(len).iter().map(|b| format!("{b:02x}")).collect()
}
