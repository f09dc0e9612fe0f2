//! Argon2id password hashing for local user records.
//!
//! Provider-authenticated users get a hash of 32 random bytes so the
//! password column is never empty and never guessable.

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use rand::RngExt;

/// Hashing failed.
#[derive(Debug, thiserror::Error)]
#[error("password hashing failed: {0}")]
pub struct PasswordError(String);

/// Hash `password` into a PHC string with a fresh random salt.
pub fn hash_password(password: &[u8]) -> Result<String, PasswordError> {
    let salt_bytes: [u8; 16] = rand::rng().random();
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| PasswordError(e.to_string()))?;
    Argon2::default()
        .hash_password(password, &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError(e.to_string()))
}

/// Check `password` against a PHC hash. Malformed hashes never verify.
#[must_use]
pub fn verify_password(password: &[u8], hash: &str) -> bool {
    PasswordHash::new(hash)
        .is_ok_and(|parsed| Argon2::default().verify_password(password, &parsed).is_ok())
}

/// Hash of 32 random bytes, for users who only authenticate by token.
pub fn placeholder_hash() -> Result<String, PasswordError> {
    let filler: [u8; 32] = rand::rng().random();
    hash_password(&filler)
}

/// [`hash_password`] on the blocking pool.
pub async fn hash_password_blocking(password: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(password.as_bytes()))
        .await
        .map_err(|e| PasswordError(e.to_string()))?
}

/// [`placeholder_hash`] on the blocking pool.
pub async fn placeholder_hash_blocking() -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(placeholder_hash)
        .await
        .map_err(|e| PasswordError(e.to_string()))?
}

/// [`verify_password`] on the blocking pool.
pub async fn verify_password_blocking(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || verify_password(password.as_bytes(), &hash))
        .await
        .unwrap_or(false)
}
