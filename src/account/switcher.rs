//! Account switching and registration
//!
//! The accounts table is the candidate list; there is exactly one active
//! session at a time, so adding another live account means logging out and
//! registering or logging in fresh.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::LockerError;

use super::auth::SecretHash;
use super::policy::{PasswordRejection, DEFAULT_MIN_LENGTH};
use super::store::{CommitKind, CredentialStore};
use super::types::Account;

/// Input for a fresh registration
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub sport: Option<String>,
    pub username: Option<String>,
    pub is_coach: bool,
    pub security_question: Option<String>,
    pub security_answer: Option<String>,
}

pub struct AccountSwitcher {
    store: Arc<CredentialStore>,
}

impl AccountSwitcher {
    pub fn new(store: Arc<CredentialStore>) -> Self {
        Self { store }
    }

    /// All locally cached accounts, in table order.
    pub async fn accounts(&self) -> Result<Vec<Account>, LockerError> {
        self.store.accounts().await
    }

    /// Make the given cached account the active session.
    pub async fn switch_to(&self, account_key: &str) -> Result<Account, LockerError> {
        let record = self
            .store
            .find_account(account_key)
            .await?
            .ok_or_else(|| LockerError::AccountNotFound(account_key.to_string()))?;
        let committed = self
            .store
            .commit_account(record, CommitKind::Profile)
            .await?;
        info!(account = %committed.key(), "switched active session");
        Ok(committed)
    }

    /// Clear the session pointer only; other cached accounts remain.
    pub async fn logout(&self) -> Result<(), LockerError> {
        self.store.clear_session().await?;
        info!("logged out");
        Ok(())
    }

    /// Remove every locally stored credential key.
    pub async fn logout_all(&self) -> Result<(), LockerError> {
        self.store.purge_all().await?;
        info!("logged out of all accounts");
        Ok(())
    }

    /// Register a fresh account and make it the active session. The
    /// password goes through the same minimum-length rule as a change.
    pub async fn register(&self, input: NewAccount) -> Result<Account, LockerError> {
        if self.store.find_account(&input.email).await?.is_some() {
            return Err(LockerError::AccountExists(input.email));
        }
        // No current secret and no history yet; only the length rule applies.
        if input.password.chars().count() < DEFAULT_MIN_LENGTH {
            return Err(PasswordRejection::TooShort {
                min: DEFAULT_MIN_LENGTH,
            }
            .into());
        }

        let now = Utc::now();
        let record = Account {
            id: Uuid::new_v4().to_string(),
            name: input.name,
            email: input.email,
            phone: input.phone,
            sport: input.sport,
            username: input.username,
            is_coach: input.is_coach,
            password: SecretHash::derive(&input.password)?,
            security_question: input.security_question,
            security_answer: input.security_answer,
            created_at: now,
            updated_at: now,
        };
        let committed = self
            .store
            .commit_account(record, CommitKind::PasswordChange)
            .await?;
        info!(account = %committed.key(), "registered new account");
        Ok(committed)
    }
}
