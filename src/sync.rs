//! Durable retry queue for pending remote deletions
//!
//! Entries live under one storage key and survive restarts. A background
//! task replays them on a fixed interval; an entry is removed only after
//! the remote call confirms, and is never dropped automatically. The queue
//! persists once per cycle: a crash between a confirmation and the persist
//! replays the delete, which the remote contract defines as a no-op.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::account::types::DeletionQueueEntry;
use crate::config::SyncConfig;
use crate::error::LockerError;
use crate::remote::RemoteAccountService;
use crate::storage::{decode, encode, KeyValueBackend};

pub const QUEUE_KEY: &str = "queue/deletions";

/// Counters for one processing cycle
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncStats {
    pub processed: usize,
    pub confirmed: usize,
    pub failed: usize,
}

pub struct SyncRetryQueue {
    backend: Arc<dyn KeyValueBackend>,
    remote: Arc<dyn RemoteAccountService>,
    interval: Duration,
    warn_after_attempts: Option<u32>,
    lock: tokio::sync::Mutex<()>,
}

impl SyncRetryQueue {
    pub fn new(
        backend: Arc<dyn KeyValueBackend>,
        remote: Arc<dyn RemoteAccountService>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            backend,
            remote,
            interval: Duration::from_secs(config.retry_interval_secs),
            warn_after_attempts: config.warn_after_attempts,
            lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Add a pending deletion. Idempotent per account key: enqueueing an
    /// account that is already queued leaves the existing entry in place.
    pub async fn enqueue(&self, account_key: &str) -> Result<(), LockerError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_entries().await?;
        if entries.iter().any(|e| e.account_key == account_key) {
            debug!(account = %account_key, "deletion already queued");
            return Ok(());
        }
        entries.push(DeletionQueueEntry::new(account_key));
        self.write_entries(&entries).await?;
        info!(account = %account_key, "queued remote deletion");
        Ok(())
    }

    pub async fn entries(&self) -> Result<Vec<DeletionQueueEntry>, LockerError> {
        self.read_entries().await
    }

    /// Run one full cycle over the queue. Confirmed entries are removed,
    /// failed ones stay with `attempts` incremented.
    pub async fn process_once(&self) -> Result<SyncStats, LockerError> {
        let _guard = self.lock.lock().await;
        let entries = self.read_entries().await?;
        if entries.is_empty() {
            return Ok(SyncStats::default());
        }

        let mut stats = SyncStats::default();
        let mut remaining = Vec::with_capacity(entries.len());
        for mut entry in entries {
            stats.processed += 1;
            match self.remote.delete_account(&entry.account_key).await {
                Ok(()) => {
                    stats.confirmed += 1;
                    info!(account = %entry.account_key, "remote deletion confirmed");
                }
                Err(e) => {
                    stats.failed += 1;
                    entry.attempts += 1;
                    match self.warn_after_attempts {
                        Some(cap) if entry.attempts >= cap => warn!(
                            account = %entry.account_key,
                            attempts = entry.attempts,
                            "remote deletion still failing: {}", e
                        ),
                        _ => debug!(
                            account = %entry.account_key,
                            attempts = entry.attempts,
                            "remote deletion failed, will retry: {}", e
                        ),
                    }
                    remaining.push(entry);
                }
            }
        }
        self.write_entries(&remaining).await?;
        Ok(stats)
    }

    /// Spawn the periodic replay task. The loop only checks for shutdown
    /// between cycles, so no entry is ever left half-processed.
    pub fn spawn(self: Arc<Self>) -> SyncQueueHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let interval = self.interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(interval_secs = interval.as_secs(), "sync retry queue started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.process_once().await {
                            Ok(stats) if stats.processed > 0 => {
                                debug!(?stats, "sync cycle finished");
                            }
                            Ok(_) => {}
                            Err(e) => error!("sync cycle failed: {}", e),
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        info!("sync retry queue stopping");
                        break;
                    }
                }
            }
        });
        SyncQueueHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn read_entries(&self) -> Result<Vec<DeletionQueueEntry>, LockerError> {
        match self.backend.get(QUEUE_KEY).await? {
            Some(raw) => decode(&raw),
            None => Ok(Vec::new()),
        }
    }

    async fn write_entries(&self, entries: &[DeletionQueueEntry]) -> Result<(), LockerError> {
        if entries.is_empty() {
            self.backend.remove(QUEUE_KEY).await
        } else {
            self.backend.set(QUEUE_KEY, encode(&entries)?).await
        }
    }
}

/// Stops the background task cleanly at app teardown.
pub struct SyncQueueHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SyncQueueHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RecordingRemote;
    use crate::storage::MemoryBackend;

    fn queue(remote: Arc<RecordingRemote>) -> SyncRetryQueue {
        let backend = Arc::new(MemoryBackend::new()) as Arc<dyn KeyValueBackend>;
        SyncRetryQueue::new(
            backend,
            remote as Arc<dyn RemoteAccountService>,
            &SyncConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_enqueue_is_idempotent() {
        let remote = Arc::new(RecordingRemote::new());
        let q = queue(remote);
        q.enqueue("a1").await.unwrap();
        q.enqueue("a1").await.unwrap();
        assert_eq!(q.entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_confirmed_entry_removed() {
        let remote = Arc::new(RecordingRemote::new());
        let q = queue(remote.clone());
        q.enqueue("a1").await.unwrap();

        let stats = q.process_once().await.unwrap();
        assert_eq!(
            stats,
            SyncStats {
                processed: 1,
                confirmed: 1,
                failed: 0
            }
        );
        assert!(q.entries().await.unwrap().is_empty());
        assert!(remote.was_deleted("a1"));

        // Reprocessing an empty queue is a no-op.
        assert_eq!(q.process_once().await.unwrap(), SyncStats::default());
    }

    #[tokio::test]
    async fn test_failed_entry_kept_with_attempts() {
        let remote = Arc::new(RecordingRemote::new());
        remote.set_failing(true);
        let q = queue(remote.clone());
        q.enqueue("a1").await.unwrap();

        for expected_attempts in 1..=3u32 {
            let stats = q.process_once().await.unwrap();
            assert_eq!(stats.failed, 1);
            let entries = q.entries().await.unwrap();
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].attempts, expected_attempts);
        }

        // Connectivity returns; entry drains on the next cycle.
        remote.set_failing(false);
        let stats = q.process_once().await.unwrap();
        assert_eq!(stats.confirmed, 1);
        assert!(q.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mixed_cycle_keeps_only_failures() {
        let remote = Arc::new(RecordingRemote::new());
        let q = queue(remote.clone());
        q.enqueue("a1").await.unwrap();
        remote.set_failing(true);
        q.enqueue("a2").await.unwrap();

        // First pass: both fail.
        q.process_once().await.unwrap();
        assert_eq!(q.entries().await.unwrap().len(), 2);

        remote.set_failing(false);
        let stats = q.process_once().await.unwrap();
        assert_eq!(stats.confirmed, 2);
        assert!(q.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_background_task_drains_queue() {
        let remote = Arc::new(RecordingRemote::new());
        let backend = Arc::new(MemoryBackend::new()) as Arc<dyn KeyValueBackend>;
        let config = SyncConfig {
            retry_interval_secs: 1,
            warn_after_attempts: None,
        };
        let q = Arc::new(SyncRetryQueue::new(
            backend,
            remote.clone() as Arc<dyn RemoteAccountService>,
            &config,
        ));
        q.enqueue("a1").await.unwrap();

        let handle = q.clone().spawn();
        // The interval's first tick fires immediately, so one cycle runs
        // right after spawn; give it a moment, then stop the task.
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.shutdown().await;

        assert!(remote.was_deleted("a1"));
        assert!(q.entries().await.unwrap().is_empty());
    }
}
