//! Salted bcrypt password hashing.
//!
//! bcrypt is deliberately slow, so both operations run on the blocking pool.

use std::sync::LazyLock;

/// bcrypt work factor.
pub const BCRYPT_COST: u32 = 10;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LENGTH: usize = 6;

// Verified against when the login email is unknown, so that path costs the
// same as a wrong password.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| bcrypt::hash("quillpost-dummy-password", BCRYPT_COST).ok());

/// Errors from the hashing layer.
#[derive(Debug)]
pub enum PasswordError {
    Hash(bcrypt::BcryptError),
    /// The blocking task panicked or was cancelled
    Join(tokio::task::JoinError),
}

impl std::fmt::Display for PasswordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordError::Hash(e) => write!(f, "Password hashing failed: {}", e),
            PasswordError::Join(e) => write!(f, "Password hashing task failed: {}", e),
        }
    }
}

impl std::error::Error for PasswordError {}

/// Hash a plaintext password with a fresh salt.
pub async fn hash_password(password: &str) -> Result<String, PasswordError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, BCRYPT_COST))
        .await
        .map_err(PasswordError::Join)?
        .map_err(PasswordError::Hash)
}

/// Check a candidate password against a stored hash.
pub async fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(PasswordError::Join)?
        .map_err(PasswordError::Hash)
}

/// Burn roughly one verification's worth of time. Always reports a mismatch.
pub async fn verify_dummy(password: &str) {
    let password = password.to_string();
    let _ = tokio::task::spawn_blocking(move || {
        if let Some(hash) = DUMMY_HASH.as_deref() {
            let _ = bcrypt::verify(password, hash);
        }
    })
    .await;
}
