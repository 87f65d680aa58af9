//! Persistent key-value backend abstraction.
//!
//! The credential store and the sync queue only ever see this trait; the
//! production backend is sled, and tests run against `MemoryBackend`.
//! `multi_set` is best-effort: each pair is written independently and a
//! failure can leave earlier pairs applied. Callers that need a whole batch
//! to land use a pending-commit marker on top of this (see
//! `account::store`).

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::RwLock;

use crate::error::LockerError;

#[async_trait]
pub trait KeyValueBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, LockerError>;
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), LockerError>;
    /// Best-effort batch write. Not atomic across keys.
    async fn multi_set(&self, pairs: Vec<(String, Vec<u8>)>) -> Result<(), LockerError>;
    async fn remove(&self, key: &str) -> Result<(), LockerError>;
    async fn multi_remove(&self, keys: &[String]) -> Result<(), LockerError>;
}

// Generic Helper: encode a value for storage
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, LockerError> {
    bincode::serialize(value).map_err(|e| LockerError::Storage(e.to_string()))
}

// Generic Helper: decode a stored value
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, LockerError> {
    bincode::deserialize(bytes).map_err(|e| LockerError::Storage(e.to_string()))
}

/// Sled-backed store, one tree, keys namespaced by prefix.
pub struct SledBackend {
    db: sled::Db,
}

impl SledBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LockerError> {
        let db = sled::open(path).map_err(|e| LockerError::Storage(e.to_string()))?;
        Ok(Self { db })
    }
}

#[async_trait]
impl KeyValueBackend for SledBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, LockerError> {
        match self.db.get(key.as_bytes()) {
            Ok(Some(ivec)) => Ok(Some(ivec.to_vec())),
            Ok(None) => Ok(None),
            Err(e) => Err(LockerError::Storage(e.to_string())),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), LockerError> {
        self.db
            .insert(key.as_bytes(), value)
            .map_err(|e| LockerError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn multi_set(&self, pairs: Vec<(String, Vec<u8>)>) -> Result<(), LockerError> {
        for (key, value) in pairs {
            self.db
                .insert(key.as_bytes(), value)
                .map_err(|e| LockerError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), LockerError> {
        self.db
            .remove(key.as_bytes())
            .map_err(|e| LockerError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn multi_remove(&self, keys: &[String]) -> Result<(), LockerError> {
        for key in keys {
            self.db
                .remove(key.as_bytes())
                .map_err(|e| LockerError::Storage(e.to_string()))?;
        }
        Ok(())
    }
}

/// In-memory backend for tests and as a stub before a device store is wired
/// in. Writes to a key listed in `fail_keys` return a storage error, which
/// is how tests exercise interrupted commits.
#[derive(Default)]
pub struct MemoryBackend {
    map: RwLock<HashMap<String, Vec<u8>>>,
    fail_keys: RwLock<HashSet<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write to `key` fail until cleared.
    pub fn fail_writes_to(&self, key: &str) {
        self.fail_keys.write().unwrap().insert(key.to_string());
    }

    pub fn clear_failures(&self) {
        self.fail_keys.write().unwrap().clear();
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.read().unwrap().contains_key(key)
    }

    fn check_writable(&self, key: &str) -> Result<(), LockerError> {
        if self.fail_keys.read().unwrap().contains(key) {
            return Err(LockerError::Storage(format!("injected failure on {}", key)));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, LockerError> {
        Ok(self.map.read().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), LockerError> {
        self.check_writable(key)?;
        self.map.write().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn multi_set(&self, pairs: Vec<(String, Vec<u8>)>) -> Result<(), LockerError> {
        // Mirrors the device store: pairs before the failing one stay applied.
        for (key, value) in pairs {
            self.check_writable(&key)?;
            self.map.write().unwrap().insert(key, value);
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), LockerError> {
        self.map.write().unwrap().remove(key);
        Ok(())
    }

    async fn multi_remove(&self, keys: &[String]) -> Result<(), LockerError> {
        let mut map = self.map.write().unwrap();
        for key in keys {
            map.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_roundtrip() {
        let backend = MemoryBackend::new();
        backend.set("k", encode(&42u64).unwrap()).await.unwrap();
        let raw = backend.get("k").await.unwrap().unwrap();
        assert_eq!(decode::<u64>(&raw).unwrap(), 42);

        backend.remove("k").await.unwrap();
        assert!(backend.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_partial_multi_set() {
        let backend = MemoryBackend::new();
        backend.fail_writes_to("b");
        let res = backend
            .multi_set(vec![
                ("a".to_string(), vec![1]),
                ("b".to_string(), vec![2]),
                ("c".to_string(), vec![3]),
            ])
            .await;
        assert!(res.is_err());
        // Best-effort semantics: "a" landed, "b" and "c" did not.
        assert!(backend.contains("a"));
        assert!(!backend.contains("b"));
        assert!(!backend.contains("c"));
    }

    #[tokio::test]
    async fn test_sled_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SledBackend::open(dir.path()).unwrap();
        backend.set("k", b"v".to_vec()).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Some(b"v".to_vec()));
        backend
            .multi_remove(&["k".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert!(backend.get("k").await.unwrap().is_none());
    }
}
