//! Connectivity and remote-service ports
//!
//! The core never talks to the network directly; the app wires in real
//! implementations, and tests (plus the offline CLI) use the doubles here.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::error::LockerError;

/// Synchronous connectivity probe, checked at the start of a deletion.
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Remote account service. Deleting an account that is already gone
/// reports success, which is what makes queue replays idempotent.
#[async_trait]
pub trait RemoteAccountService: Send + Sync {
    async fn delete_account(&self, account_key: &str) -> Result<(), LockerError>;
}

/// Connectivity double with a switchable state. `FixedConnectivity::offline()`
/// is also what the diagnostic CLI wires in, so its deletions only enqueue.
pub struct FixedConnectivity {
    online: AtomicBool,
}

impl FixedConnectivity {
    pub fn online() -> Self {
        Self {
            online: AtomicBool::new(true),
        }
    }

    pub fn offline() -> Self {
        Self {
            online: AtomicBool::new(false),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl Connectivity for FixedConnectivity {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Remote double that records confirmed deletions and can be forced to
/// fail. Re-deleting a recorded key succeeds, per the service contract.
#[derive(Default)]
pub struct RecordingRemote {
    failing: AtomicBool,
    deleted: Mutex<HashSet<String>>,
}

impl RecordingRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn was_deleted(&self, account_key: &str) -> bool {
        self.deleted.lock().unwrap().contains(account_key)
    }

    pub fn deletion_count(&self) -> usize {
        self.deleted.lock().unwrap().len()
    }
}

#[async_trait]
impl RemoteAccountService for RecordingRemote {
    async fn delete_account(&self, account_key: &str) -> Result<(), LockerError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LockerError::Network("remote delete unavailable".to_string()));
        }
        self.deleted.lock().unwrap().insert(account_key.to_string());
        Ok(())
    }
}
