use thiserror::Error;

use crate::account::auth::AuthFailure;
use crate::account::policy::PasswordRejection;

#[derive(Error, Debug)]
pub enum LockerError {
    #[error("password rejected: {0}")]
    Validation(#[from] PasswordRejection),
    #[error("confirmation does not match the new password")]
    ConfirmationMismatch,
    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthFailure),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("account not found: {0}")]
    AccountNotFound(String),
    #[error("account already exists: {0}")]
    AccountExists(String),
    #[error("password reset unavailable: no security question configured")]
    ResetBlocked,
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl LockerError {
    /// Recoverable errors are re-entry cases the UI retries in place;
    /// everything else needs a different path (reconnect, support, restart).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LockerError::Validation(_)
                | LockerError::ConfirmationMismatch
                | LockerError::Authentication(_)
        )
    }
}
