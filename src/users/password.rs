use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::error::AppError;

/// Hashes a user secret with Argon2id and a fresh salt. Runs on the blocking
/// pool since hashing is deliberately slow.
pub async fn hash_secret(plain: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_blocking(&plain))
        .await
        .map_err(|e| anyhow::anyhow!("spawn secret hashing task: {}", e))?
}

fn hash_blocking(plain: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}
