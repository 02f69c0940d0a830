//! Credential generation and hashing

use crate::error::InfraError;
use argon2::password_hash::rand_core::OsRng as HashRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

/// Number of random bytes behind each generated secret
pub const SECRET_BYTES: usize = 32;

/// Produces fresh secrets for clients and users.
pub trait PasswordGenerator: Send + Sync {
    /// Generate a new secret.
    fn generate(&self) -> Result<String, InfraError>;
}

/// 32 bytes from the OS RNG, URL-safe base64 encoded with padding.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPasswordGenerator;

impl PasswordGenerator for RandomPasswordGenerator {
    fn generate(&self) -> Result<String, InfraError> {
        let mut bytes = [0u8; SECRET_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| InfraError::Password(format!("random source unavailable: {e}")))?;
        Ok(URL_SAFE.encode(bytes))
    }
}

/// Hash a secret with argon2id and a random salt.
pub fn hash_password(password: &str) -> Result<String, InfraError> {
    let salt = SaltString::generate(&mut HashRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| InfraError::Password(format!("failed to hash secret: {e}")))
}

/// Whether `password` matches a PHC-encoded hash. Malformed hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .is_ok_and(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}
