//! Secret hashing and verification
//!
//! Passwords are stored as Argon2id PHC strings, never as raw text, and
//! compared through the verifier (constant-time). Security answers are kept
//! as entered because the contract for them is a case-insensitive, trimmed
//! text compare.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("current password is incorrect")]
    WrongPassword,
    #[error("security answer is incorrect")]
    WrongSecurityAnswer,
    #[error("device authentication failed")]
    DeviceAuth,
}

/// Argon2id hash of a password, stored in PHC string form
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SecretHash(String);

impl SecretHash {
    /// Hash a password with a fresh random salt.
    pub fn derive(secret: &str) -> Result<Self, AuthFailure> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|_| AuthFailure::WrongPassword)?;
        Ok(Self(hash.to_string()))
    }

    /// Verify a candidate against this hash.
    pub fn matches(&self, candidate: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(&self.0) else {
            return false;
        };
        Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok()
    }
}

/// Security-answer compare: trimmed, case-insensitive.
pub fn security_answer_matches(stored: &str, submitted: &str) -> bool {
    stored.trim().to_lowercase() == submitted.trim().to_lowercase()
}
