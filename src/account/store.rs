//! Credential store: the typed wrapper over the key-value backend
//!
//! Owns the key schema for the session pointer, the accounts table, the
//! per-account password history, preferences and stats. The backend has no
//! transactions and no foreign keys, so two disciplines live here:
//!
//! - Every table mutation is read-entire-table, mutate, write-entire-table,
//!   serialized behind one mutex. A password change racing a profile save
//!   would otherwise lose one of the writes.
//! - `multi_set` is best-effort, so a commit batch is recorded under a
//!   pending-commit key first and cleared after it lands.
//!   `recover_pending_commit` replays an interrupted batch on startup.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::PolicyConfig;
use crate::error::LockerError;
use crate::storage::{decode, encode, KeyValueBackend};

use super::auth::{AuthFailure, SecretHash};
use super::policy;
use super::types::{Account, Preferences, Stats};

/// Storage key schema. The session pointer, cached profile and email hint
/// are written together by every commit; history keys are per-account.
pub mod keys {
    pub const SESSION_CURRENT: &str = "session/current";
    pub const PROFILE_CACHE: &str = "profile/cache";
    pub const SESSION_EMAIL: &str = "session/email";
    pub const ACCOUNTS_TABLE: &str = "accounts/table";
    pub const PREFERENCES: &str = "prefs/device";
    pub const STATS: &str = "stats/device";
    pub const PENDING_COMMIT: &str = "commit/pending";

    pub fn history(account_key: &str) -> String {
        format!("history/{}", account_key)
    }
}

/// Whether a commit carries a new secret or only profile fields.
/// Profile commits never touch the stored password hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitKind {
    Profile,
    PasswordChange,
}

pub struct CredentialStore {
    backend: Arc<dyn KeyValueBackend>,
    table_lock: Mutex<()>,
    min_password_length: usize,
    history_depth: usize,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self::with_policy(backend, &PolicyConfig::default())
    }

    pub fn with_policy(backend: Arc<dyn KeyValueBackend>, policy: &PolicyConfig) -> Self {
        Self {
            backend,
            table_lock: Mutex::new(()),
            min_password_length: policy.min_password_length,
            history_depth: policy.history_depth,
        }
    }

    /// Resolve the active account. The backend has no foreign-key guarantee
    /// between the pointer and the table, so a broken pointer falls through
    /// a fixed chain: cached profile, then the session email hint against
    /// the table, then the most-recently-created record. Dropping any rung
    /// silently loses a user's session after a partial write.
    pub async fn load_current_account(&self) -> Result<Account, LockerError> {
        if let Some(raw) = self.backend.get(keys::SESSION_CURRENT).await? {
            return decode::<Account>(&raw);
        }
        if let Some(raw) = self.backend.get(keys::PROFILE_CACHE).await? {
            debug!("session pointer missing, using cached profile");
            return decode::<Account>(&raw);
        }
        let table = self.read_table().await?;
        if let Some(raw) = self.backend.get(keys::SESSION_EMAIL).await? {
            let hint: String = decode(&raw)?;
            if let Some(acc) = table.iter().find(|a| a.email == hint) {
                debug!(email = %hint, "session pointer missing, matched email hint");
                return Ok(acc.clone());
            }
        }
        // Last rung: newest record in the table.
        if let Some(acc) = table.iter().max_by_key(|a| a.created_at) {
            warn!(account = %acc.key(), "no session keys, falling back to newest account");
            return Ok(acc.clone());
        }
        Err(LockerError::AccountNotFound("no active session".to_string()))
    }

    /// Write `record` as the active account: session pointer, cached
    /// profile, email hint and the table upsert land as one logical
    /// operation. Profile commits preserve the stored password hash.
    pub async fn commit_account(
        &self,
        record: Account,
        kind: CommitKind,
    ) -> Result<Account, LockerError> {
        let _guard = self.table_lock.lock().await;
        self.commit_locked(record, kind, Vec::new()).await
    }

    /// Verify the current password, run the policy, displace the old hash
    /// into history and commit the new one, all under the table lock.
    pub async fn change_password(
        &self,
        account_key: &str,
        current: &str,
        candidate: &str,
        confirmation: &str,
    ) -> Result<(), LockerError> {
        let _guard = self.table_lock.lock().await;
        let account = self
            .find_in_table(account_key)
            .await?
            .ok_or_else(|| LockerError::AccountNotFound(account_key.to_string()))?;
        if !account.password.matches(current) {
            return Err(AuthFailure::WrongPassword.into());
        }
        self.apply_new_password(account, candidate, confirmation).await
    }

    /// Password-reset commit: same policy and history handling as
    /// `change_password`, but the current password has already been replaced
    /// by the reset flow's own gates.
    pub async fn reset_password(
        &self,
        account_key: &str,
        candidate: &str,
        confirmation: &str,
    ) -> Result<(), LockerError> {
        let _guard = self.table_lock.lock().await;
        let account = self
            .find_in_table(account_key)
            .await?
            .ok_or_else(|| LockerError::AccountNotFound(account_key.to_string()))?;
        self.apply_new_password(account, candidate, confirmation).await
    }

    async fn apply_new_password(
        &self,
        mut account: Account,
        candidate: &str,
        confirmation: &str,
    ) -> Result<(), LockerError> {
        if candidate != confirmation {
            return Err(LockerError::ConfirmationMismatch);
        }
        let history_key = keys::history(account.key());
        let mut history = self.read_history(&history_key).await?;
        policy::validate_new_password_with(
            candidate,
            &account.password,
            &history,
            self.min_password_length,
        )?;

        let displaced = std::mem::replace(
            &mut account.password,
            SecretHash::derive(candidate).map_err(LockerError::Authentication)?,
        );
        history.insert(0, displaced);
        history.truncate(self.history_depth);

        let extra = vec![(history_key, encode(&history)?)];
        self.commit_locked(account, CommitKind::PasswordChange, extra)
            .await?;
        info!("password updated");
        Ok(())
    }

    // Caller must hold `table_lock`.
    async fn commit_locked(
        &self,
        mut record: Account,
        kind: CommitKind,
        extra: Vec<(String, Vec<u8>)>,
    ) -> Result<Account, LockerError> {
        let mut table = self.read_table().await?;
        record.updated_at = chrono::Utc::now();
        match table.iter_mut().find(|a| a.matches_key(record.key())) {
            Some(existing) => {
                if kind == CommitKind::Profile {
                    // A profile-only save must never blank or stale-overwrite
                    // the secret.
                    record.password = existing.password.clone();
                }
                *existing = record.clone();
            }
            None => table.push(record.clone()),
        }

        let mut batch: Vec<(String, Vec<u8>)> = vec![
            (keys::SESSION_CURRENT.to_string(), encode(&record)?),
            (keys::PROFILE_CACHE.to_string(), encode(&record)?),
            (keys::SESSION_EMAIL.to_string(), encode(&record.email)?),
            (keys::ACCOUNTS_TABLE.to_string(), encode(&table)?),
        ];
        batch.extend(extra);

        // Marker first: if the multi_set is interrupted, startup replays it.
        self.backend
            .set(keys::PENDING_COMMIT, encode(&batch)?)
            .await?;
        self.backend.multi_set(batch).await?;
        self.backend.remove(keys::PENDING_COMMIT).await?;
        Ok(record)
    }

    /// Finish an interrupted commit, if one was left behind. Returns true
    /// when a batch was replayed. Call once at startup, before serving.
    pub async fn recover_pending_commit(&self) -> Result<bool, LockerError> {
        let _guard = self.table_lock.lock().await;
        let Some(raw) = self.backend.get(keys::PENDING_COMMIT).await? else {
            return Ok(false);
        };
        let batch: Vec<(String, Vec<u8>)> = decode(&raw)?;
        warn!(keys = batch.len(), "replaying interrupted commit");
        self.backend.multi_set(batch).await?;
        self.backend.remove(keys::PENDING_COMMIT).await?;
        Ok(true)
    }

    pub async fn accounts(&self) -> Result<Vec<Account>, LockerError> {
        self.read_table().await
    }

    pub async fn find_account(&self, key: &str) -> Result<Option<Account>, LockerError> {
        self.find_in_table(key).await
    }

    pub async fn password_history(&self, account_key: &str) -> Result<Vec<SecretHash>, LockerError> {
        self.read_history(&keys::history(account_key)).await
    }

    pub async fn set_preferences(&self, prefs: &Preferences) -> Result<(), LockerError> {
        self.backend.set(keys::PREFERENCES, encode(prefs)?).await
    }

    pub async fn get_preferences(&self) -> Result<Preferences, LockerError> {
        match self.backend.get(keys::PREFERENCES).await? {
            Some(raw) => decode(&raw),
            None => Ok(Preferences::default()),
        }
    }

    pub async fn set_stats(&self, stats: &Stats) -> Result<(), LockerError> {
        self.backend.set(keys::STATS, encode(stats)?).await
    }

    pub async fn get_stats(&self) -> Result<Stats, LockerError> {
        match self.backend.get(keys::STATS).await? {
            Some(raw) => decode(&raw),
            None => Ok(Stats::default()),
        }
    }

    /// Clear the session keys only; cached accounts stay in the table.
    pub async fn clear_session(&self) -> Result<(), LockerError> {
        self.backend
            .multi_remove(&[
                keys::SESSION_CURRENT.to_string(),
                keys::PROFILE_CACHE.to_string(),
                keys::SESSION_EMAIL.to_string(),
            ])
            .await
    }

    /// Delete every key this store owns. Local-only, so it works offline.
    /// The deletion sync queue is not owned here and survives a purge.
    pub async fn purge_all(&self) -> Result<(), LockerError> {
        let _guard = self.table_lock.lock().await;
        let mut owned = vec![
            keys::SESSION_CURRENT.to_string(),
            keys::PROFILE_CACHE.to_string(),
            keys::SESSION_EMAIL.to_string(),
            keys::ACCOUNTS_TABLE.to_string(),
            keys::PREFERENCES.to_string(),
            keys::STATS.to_string(),
            keys::PENDING_COMMIT.to_string(),
        ];
        for account in self.read_table().await? {
            owned.push(keys::history(account.key()));
        }
        self.backend.multi_remove(&owned).await?;
        info!("purged all credential keys");
        Ok(())
    }

    async fn read_table(&self) -> Result<Vec<Account>, LockerError> {
        match self.backend.get(keys::ACCOUNTS_TABLE).await? {
            Some(raw) => decode(&raw),
            None => Ok(Vec::new()),
        }
    }

    async fn find_in_table(&self, key: &str) -> Result<Option<Account>, LockerError> {
        Ok(self
            .read_table()
            .await?
            .into_iter()
            .find(|a| a.matches_key(key)))
    }

    async fn read_history(&self, history_key: &str) -> Result<Vec<SecretHash>, LockerError> {
        match self.backend.get(history_key).await? {
            Some(raw) => decode(&raw),
            None => Ok(Vec::new()),
        }
    }
}
