//! Author password hashing.
//!
//! Hashes are bcrypt strings (`$2b$<cost>$<salt+digest>`); the salt and
//! cost travel inside the hash, and `bcrypt::verify` compares in constant
//! time. Both calls are CPU-bound, so request handlers run them on the
//! blocking pool.

use inkwell_common::InkwellError;

/// Work factor for newly hashed passwords
pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

/// Hash a password with a fresh random salt
pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, cost)
}

/// Check a password against a stored hash. Malformed hashes never verify.
pub fn verify_password(stored: &str, password: &str) -> bool {
    bcrypt::verify(password, stored).unwrap_or(false)
}

/// [`verify_password`] off the async executor
pub async fn verify_password_blocking(stored: String, password: String) -> Result<bool, InkwellError> {
    tokio::task::spawn_blocking(move || verify_password(&stored, &password))
        .await
        .map_err(|e| InkwellError::Internal(format!("password check aborted: {e}")))
}

/// [`hash_password`] off the async executor
pub async fn hash_password_blocking(password: String, cost: u32) -> Result<String, InkwellError> {
    tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|e| InkwellError::Internal(format!("password hashing aborted: {e}")))?
        .map_err(|e| InkwellError::Internal(format!("password hashing failed: {e}")))
}
