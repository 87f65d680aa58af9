//! Account deletion
//!
//! Local deletion is immediate and unconditional; the remote deletion is
//! eventually consistent. Online with a healthy service, both happen now.
//! Offline, or when the remote call fails, the deletion is queued for the
//! sync task and the local purge still runs. The outcome tells the UI
//! which of the two stories to show.

use std::sync::Arc;
use tracing::{info, warn};

use crate::error::LockerError;
use crate::remote::{Connectivity, RemoteAccountService};
use crate::sync::SyncRetryQueue;

use super::store::CredentialStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionOutcome {
    /// Remote and local deletion both completed.
    Deleted,
    /// Local state is gone; the remote deletion is queued for retry.
    DeletedLocallyPendingSync,
}

pub struct DeletionCoordinator {
    store: Arc<CredentialStore>,
    queue: Arc<SyncRetryQueue>,
    connectivity: Arc<dyn Connectivity>,
    remote: Arc<dyn RemoteAccountService>,
}

impl DeletionCoordinator {
    pub fn new(
        store: Arc<CredentialStore>,
        queue: Arc<SyncRetryQueue>,
        connectivity: Arc<dyn Connectivity>,
        remote: Arc<dyn RemoteAccountService>,
    ) -> Self {
        Self {
            store,
            queue,
            connectivity,
            remote,
        }
    }

    pub async fn delete_account(&self, account_key: &str) -> Result<DeletionOutcome, LockerError> {
        let mut pending = false;
        // If both the remote call and the enqueue fail, the purge still
        // runs and the enqueue error is surfaced afterwards.
        let mut enqueue_failure: Option<LockerError> = None;

        if self.connectivity.is_online() {
            match self.remote.delete_account(account_key).await {
                Ok(()) => info!(account = %account_key, "remote deletion confirmed"),
                Err(e) => {
                    warn!(account = %account_key, "remote deletion failed, queueing: {}", e);
                    pending = true;
                    if let Err(qe) = self.queue.enqueue(account_key).await {
                        enqueue_failure = Some(qe);
                    }
                }
            }
        } else {
            info!(account = %account_key, "offline, queueing remote deletion");
            pending = true;
            if let Err(qe) = self.queue.enqueue(account_key).await {
                enqueue_failure = Some(qe);
            }
        }

        // Local deletion is unconditional. The purge covers the session
        // keys, so the pointer is gone with everything else.
        self.store.purge_all().await?;

        if let Some(e) = enqueue_failure {
            warn!(account = %account_key, "local purge done but deletion could not be queued");
            return Err(e);
        }
        Ok(if pending {
            DeletionOutcome::DeletedLocallyPendingSync
        } else {
            DeletionOutcome::Deleted
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::auth::SecretHash;
    use crate::account::store::CommitKind;
    use crate::account::types::Account;
    use crate::config::SyncConfig;
    use crate::remote::{FixedConnectivity, RecordingRemote};
    use crate::storage::{KeyValueBackend, MemoryBackend};
    use crate::sync::QUEUE_KEY;
    use chrono::Utc;

    struct Fixture {
        backend: Arc<MemoryBackend>,
        store: Arc<CredentialStore>,
        queue: Arc<SyncRetryQueue>,
        connectivity: Arc<FixedConnectivity>,
        remote: Arc<RecordingRemote>,
        coordinator: DeletionCoordinator,
    }

    async fn fixture(online: bool) -> Fixture {
        let backend = Arc::new(MemoryBackend::new());
        let store = Arc::new(CredentialStore::new(
            backend.clone() as Arc<dyn KeyValueBackend>
        ));
        let remote = Arc::new(RecordingRemote::new());
        let queue = Arc::new(SyncRetryQueue::new(
            backend.clone() as Arc<dyn KeyValueBackend>,
            remote.clone() as Arc<dyn RemoteAccountService>,
            &SyncConfig::default(),
        ));
        let connectivity = Arc::new(if online {
            FixedConnectivity::online()
        } else {
            FixedConnectivity::offline()
        });

        let account = Account {
            id: "a1".to_string(),
            name: "Jo Hayes".to_string(),
            email: "jo@club.example".to_string(),
            phone: None,
            sport: Some("rowing".to_string()),
            username: None,
            is_coach: true,
            password: SecretHash::derive("rowhard1").unwrap(),
            security_question: None,
            security_answer: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store
            .commit_account(account, CommitKind::Profile)
            .await
            .unwrap();

        let coordinator = DeletionCoordinator::new(
            store.clone(),
            queue.clone(),
            connectivity.clone() as Arc<dyn Connectivity>,
            remote.clone() as Arc<dyn RemoteAccountService>,
        );
        Fixture {
            backend,
            store,
            queue,
            connectivity,
            remote,
            coordinator,
        }
    }

    #[tokio::test]
    async fn test_online_delete_is_immediate() {
        let f = fixture(true).await;
        let outcome = f.coordinator.delete_account("a1").await.unwrap();
        assert_eq!(outcome, DeletionOutcome::Deleted);
        assert!(f.remote.was_deleted("a1"));
        assert!(f.queue.entries().await.unwrap().is_empty());
        assert!(matches!(
            f.store.load_current_account().await,
            Err(LockerError::AccountNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_offline_delete_purges_and_queues() {
        let f = fixture(false).await;
        let outcome = f.coordinator.delete_account("a1").await.unwrap();
        assert_eq!(outcome, DeletionOutcome::DeletedLocallyPendingSync);

        // No session data, exactly one queue entry.
        assert!(matches!(
            f.store.load_current_account().await,
            Err(LockerError::AccountNotFound(_))
        ));
        let entries = f.queue.entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].account_key, "a1");
        assert!(!f.remote.was_deleted("a1"));

        // Connectivity returns; the queue drains and stays drained.
        f.connectivity.set_online(true);
        let stats = f.queue.process_once().await.unwrap();
        assert_eq!(stats.confirmed, 1);
        assert!(f.queue.entries().await.unwrap().is_empty());
        assert!(f.remote.was_deleted("a1"));

        // Idempotence: another cycle touches nothing.
        let stats = f.queue.process_once().await.unwrap();
        assert_eq!(stats.processed, 0);
        assert_eq!(f.remote.deletion_count(), 1);
    }

    #[tokio::test]
    async fn test_remote_failure_still_purges_locally() {
        let f = fixture(true).await;
        f.remote.set_failing(true);
        let outcome = f.coordinator.delete_account("a1").await.unwrap();
        assert_eq!(outcome, DeletionOutcome::DeletedLocallyPendingSync);
        assert_eq!(f.queue.entries().await.unwrap().len(), 1);
        assert!(matches!(
            f.store.load_current_account().await,
            Err(LockerError::AccountNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_queue_entry_survives_purge() {
        let f = fixture(false).await;
        f.coordinator.delete_account("a1").await.unwrap();
        // purge_all ran inside delete_account; the queue key is not owned
        // by the credential store and must still be there.
        assert!(f.backend.contains(QUEUE_KEY));
    }

    #[tokio::test]
    async fn test_double_failure_purges_then_errors() {
        let f = fixture(false).await;
        f.backend.fail_writes_to(QUEUE_KEY);
        let err = f.coordinator.delete_account("a1").await.unwrap_err();
        assert!(matches!(err, LockerError::Storage(_)));
        // The purge still happened.
        f.backend.clear_failures();
        assert!(matches!(
            f.store.load_current_account().await,
            Err(LockerError::AccountNotFound(_))
        ));
    }
}
