//! Argon2 credential hashing, run on tokio's blocking pool.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

/// Produce a salted PHC string for `plain`.
pub async fn hash_password(plain: String) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(plain.as_bytes(), &salt)
            .map(|phc| phc.to_string())
            .map_err(|e| {
                error!(error = %e, "argon2 hash failed");
                anyhow::anyhow!("hash password: {e}")
            })
    })
    .await?
}

/// `Ok(false)` means the password did not match; `Err` means the stored hash is unreadable.
pub async fn verify_password(plain: String, stored: String) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
        let parsed = PasswordHash::new(&stored).map_err(|e| {
            error!(error = %e, "stored password hash is not a PHC string");
            anyhow::anyhow!("parse password hash: {e}")
        })?;
        Ok(Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    })
    .await?
}
