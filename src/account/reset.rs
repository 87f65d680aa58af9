//! Password-reset flow
//!
//! Multi-step reset gated by the account's security question and, when the
//! device offers one, a biometric/PIN check. The session is in-memory only:
//! nothing persists until the final commit, so cancelling at any step
//! leaves the stored account untouched.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::LockerError;

use super::auth::{security_answer_matches, AuthFailure};
use super::store::CredentialStore;
use super::types::Account;

/// What the device offers for the optional authentication step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceAuthKind {
    Face,
    Fingerprint,
    Iris,
    PinOrPattern,
}

/// OS-provided verification consumed as a pass/fail result. The flow only
/// looks at availability, kind and the outcome, never at a platform API.
#[async_trait]
pub trait DeviceAuthenticator: Send + Sync {
    fn available(&self) -> bool;
    fn kind(&self) -> Option<DeviceAuthKind>;
    async fn authenticate(&self) -> Result<bool, LockerError>;
}

/// Always-unavailable authenticator for devices without biometrics.
pub struct NoDeviceAuth;

#[async_trait]
impl DeviceAuthenticator for NoDeviceAuth {
    fn available(&self) -> bool {
        false
    }
    fn kind(&self) -> Option<DeviceAuthKind> {
        None
    }
    async fn authenticate(&self) -> Result<bool, LockerError> {
        Ok(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetState {
    Idle,
    AwaitingSecurityAnswer,
    AwaitingDeviceAuth,
    AwaitingNewPassword,
    Completed,
    Cancelled,
    Blocked,
}

impl ResetState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResetState::Completed | ResetState::Cancelled | ResetState::Blocked
        )
    }
}

/// One reset attempt for one account. Dropped on completion or cancel.
pub struct ResetFlow {
    store: Arc<CredentialStore>,
    device_auth: Arc<dyn DeviceAuthenticator>,
    account: Account,
    state: ResetState,
    wrong_answers: u32,
    max_answer_attempts: Option<u32>,
}

impl ResetFlow {
    pub fn new(
        store: Arc<CredentialStore>,
        device_auth: Arc<dyn DeviceAuthenticator>,
        account: Account,
        max_answer_attempts: Option<u32>,
    ) -> Self {
        Self {
            store,
            device_auth,
            account,
            state: ResetState::Idle,
            wrong_answers: 0,
            max_answer_attempts,
        }
    }

    pub fn state(&self) -> ResetState {
        self.state
    }

    pub fn security_question(&self) -> Option<&str> {
        self.account.security_question.as_deref()
    }

    /// Start the attempt. Accounts without a configured security question
    /// cannot reset on-device; the caller directs them to support.
    pub fn initiate(&mut self) -> Result<ResetState, LockerError> {
        self.expect(ResetState::Idle)?;
        if !self.account.has_security_question() {
            warn!(account = %self.account.key(), "reset blocked: no security question");
            self.state = ResetState::Blocked;
            return Err(LockerError::ResetBlocked);
        }
        self.state = ResetState::AwaitingSecurityAnswer;
        Ok(self.state)
    }

    /// Wrong answers keep the state unchanged so the user can retry; with a
    /// configured attempt cap, exhausting it blocks the attempt instead.
    pub fn submit_answer(&mut self, answer: &str) -> Result<ResetState, LockerError> {
        self.expect(ResetState::AwaitingSecurityAnswer)?;
        let stored = self
            .account
            .security_answer
            .as_deref()
            .ok_or(LockerError::ResetBlocked)?;
        if !security_answer_matches(stored, answer) {
            self.wrong_answers += 1;
            if let Some(max) = self.max_answer_attempts {
                if self.wrong_answers >= max {
                    warn!(
                        attempts = self.wrong_answers,
                        "reset blocked: answer attempts exhausted"
                    );
                    self.state = ResetState::Blocked;
                    return Err(LockerError::ResetBlocked);
                }
            }
            return Err(AuthFailure::WrongSecurityAnswer.into());
        }
        self.state = if self.device_auth.available() {
            ResetState::AwaitingDeviceAuth
        } else {
            ResetState::AwaitingNewPassword
        };
        Ok(self.state)
    }

    /// Run the device check. Failure keeps the state unchanged and is
    /// retryable; the user can also `skip_device_auth` instead.
    pub async fn authenticate_device(&mut self) -> Result<ResetState, LockerError> {
        self.expect(ResetState::AwaitingDeviceAuth)?;
        if self.device_auth.authenticate().await? {
            self.state = ResetState::AwaitingNewPassword;
            Ok(self.state)
        } else {
            Err(AuthFailure::DeviceAuth.into())
        }
    }

    pub fn skip_device_auth(&mut self) -> Result<ResetState, LockerError> {
        self.expect(ResetState::AwaitingDeviceAuth)?;
        self.state = ResetState::AwaitingNewPassword;
        Ok(self.state)
    }

    /// Validate the candidate through the shared policy and commit it. On
    /// rejection the state is unchanged for re-entry.
    pub async fn submit_new_password(
        &mut self,
        candidate: &str,
        confirmation: &str,
    ) -> Result<ResetState, LockerError> {
        self.expect(ResetState::AwaitingNewPassword)?;
        self.store
            .reset_password(self.account.key(), candidate, confirmation)
            .await?;
        info!(account = %self.account.key(), "password reset completed");
        self.state = ResetState::Completed;
        Ok(self.state)
    }

    /// Abandon the attempt. Valid from any non-terminal state; nothing has
    /// been persisted at that point.
    pub fn cancel(&mut self) -> Result<ResetState, LockerError> {
        if self.state.is_terminal() {
            return Err(LockerError::InvalidState(format!(
                "cannot cancel a reset in {:?}",
                self.state
            )));
        }
        self.state = ResetState::Cancelled;
        Ok(self.state)
    }

    fn expect(&self, wanted: ResetState) -> Result<(), LockerError> {
        if self.state != wanted {
            return Err(LockerError::InvalidState(format!(
                "expected {:?}, reset is in {:?}",
                wanted, self.state
            )));
        }
        Ok(())
    }
}
