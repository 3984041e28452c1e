//! Password hashing and token digests
//!
//! Hashing and verification run on the blocking pool.

use sha2::{Digest, Sha256};

use crate::error::ApiError;

pub async fn hash_password(password: String, cost: u32) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await?
        .map_err(|e| ApiError::Internal(format!("Password hashing failed: {}", e)))
}

/// Constant-time comparison against a stored bcrypt hash
pub async fn verify_password(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await?
        .map_err(|e| ApiError::Internal(format!("Password verification failed: {}", e)))
}

/// Hash a token for storage
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
