//! In-memory store implementation
//!
//! Suitable for tests and simulation. Reads and writes can be switched to
//! fail independently so callers' degraded-persistence paths can be tested.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use agora_core::{PersistentStore, StorageError};
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::trace;

/// In-memory implementation of [`PersistentStore`]
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: DashMap<String, String>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    /// Successful set/remove calls, for asserting write amplification
    write_count: AtomicUsize,
}

impl InMemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `get` fail until cleared
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every `set` and `remove` fail until cleared
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Copy of all entries, ordered by key
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Successful writes so far
    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable("writes disabled"));
        }
        Ok(())
    }
}

#[async_trait]
impl PersistentStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable("reads disabled"));
        }
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.check_writable()?;
        trace!(key, len = value.len(), "Setting key");
        self.entries.insert(key.to_string(), value);
        self.write_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_writable()?;
        trace!(key, "Removing key");
        self.entries.remove(key);
        self.write_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = InMemoryStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", "v1".to_string()).await.unwrap();
        store.set("k", "v2".to_string()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));

        store.remove("k").await.unwrap();
        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.write_count(), 4);
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let store = InMemoryStore::new();
        store.set("k", "v".to_string()).await.unwrap();

        store.set_fail_writes(true);
        assert_err!(store.set("k", "other".to_string()).await);
        assert_err!(store.remove("k").await);
        assert_eq!(assert_ok!(store.get("k").await).as_deref(), Some("v"));

        store.set_fail_reads(true);
        assert_err!(store.get("k").await);

        store.set_fail_reads(false);
        store.set_fail_writes(false);
        store.remove("k").await.unwrap();
        assert!(store.is_empty());
    }
}
