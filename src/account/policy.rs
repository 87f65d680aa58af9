//! Password policy engine
//!
//! Pure validation shared by the change-password flow and the reset flow so
//! both enforce the same rules, checked in a fixed order: length, then
//! difference from the current password, then history reuse.

use thiserror::Error;

use super::auth::SecretHash;

/// Minimum accepted password length unless configured otherwise
pub const DEFAULT_MIN_LENGTH: usize = 6;

/// How many displaced passwords are retained per account
pub const DEFAULT_HISTORY_DEPTH: usize = 5;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PasswordRejection {
    #[error("password must be at least {min} characters")]
    TooShort { min: usize },
    #[error("new password must differ from the current password")]
    SameAsCurrent,
    #[error("password was used recently and cannot be reused")]
    PreviouslyUsed,
}

pub fn validate_new_password(
    candidate: &str,
    current: &SecretHash,
    history: &[SecretHash],
) -> Result<(), PasswordRejection> {
    validate_new_password_with(candidate, current, history, DEFAULT_MIN_LENGTH)
}

pub fn validate_new_password_with(
    candidate: &str,
    current: &SecretHash,
    history: &[SecretHash],
    min_length: usize,
) -> Result<(), PasswordRejection> {
    if candidate.chars().count() < min_length {
        return Err(PasswordRejection::TooShort { min: min_length });
    }
    if current.matches(candidate) {
        return Err(PasswordRejection::SameAsCurrent);
    }
    if history.iter().any(|old| old.matches(candidate)) {
        return Err(PasswordRejection::PreviouslyUsed);
    }
    Ok(())
}
