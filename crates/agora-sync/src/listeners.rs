//! Listener registry
//!
//! Listeners are grouped under caller-chosen keys (several listeners may
//! share a key) and each registration returns a [`ListenerHandle`] used to
//! remove exactly that listener later.
//!
//! Dispatch iterates over a snapshot taken under a short read lock, so a
//! listener may register or unregister listeners (itself included) from
//! inside its callback without corrupting the iteration.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use agora_core::SyncEvent;
use parking_lot::RwLock;
use tracing::warn;

use crate::error::ListenerError;

/// Callback invoked for every delivered event
pub type Listener = Arc<dyn Fn(&SyncEvent) -> Result<(), ListenerError> + Send + Sync>;

/// Identifies one registration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerHandle {
    id: u64,
    key: Arc<str>,
}

impl ListenerHandle {
    /// The key this listener was registered under
    pub fn key(&self) -> &str {
        &self.key
    }
}

struct Registration {
    id: u64,
    key: Arc<str>,
    listener: Listener,
}

/// Outcome of dispatching one event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Listeners that returned `Ok`
    pub delivered: usize,
    /// Listeners that returned an error or panicked
    pub failed: usize,
}

/// Registry of sync listeners, in registration order
#[derive(Default)]
pub struct ListenerRegistry {
    registrations: RwLock<Vec<Registration>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener under `key`
    pub fn register<F>(&self, key: impl Into<String>, listener: F) -> ListenerHandle
    where
        F: Fn(&SyncEvent) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        let key: Arc<str> = Arc::from(key.into());
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.registrations.write().push(Registration {
            id,
            key: key.clone(),
            listener: Arc::new(listener),
        });
        ListenerHandle { id, key }
    }

    /// Remove one listener; returns false if it was already gone
    pub fn unregister(&self, handle: &ListenerHandle) -> bool {
        let mut registrations = self.registrations.write();
        let before = registrations.len();
        registrations.retain(|r| r.id != handle.id);
        registrations.len() != before
    }

    /// Remove every listener registered under `key`, returning how many
    pub fn unregister_key(&self, key: &str) -> usize {
        let mut registrations = self.registrations.write();
        let before = registrations.len();
        registrations.retain(|r| &*r.key != key);
        before - registrations.len()
    }

    /// Remove all listeners
    pub fn clear(&self) {
        self.registrations.write().clear();
    }

    pub fn len(&self) -> usize {
        self.registrations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.read().is_empty()
    }

    /// Number of listeners under `key`
    pub fn count_for(&self, key: &str) -> usize {
        self.registrations
            .read()
            .iter()
            .filter(|r| &*r.key == key)
            .count()
    }

    /// Invoke every listener with `event`
    ///
    /// A listener that errors or panics is logged and skipped; the rest
    /// still receive the event.
    pub fn dispatch(&self, event: &SyncEvent) -> DispatchReport {
        let snapshot: Vec<(u64, Arc<str>, Listener)> = self
            .registrations
            .read()
            .iter()
            .map(|r| (r.id, r.key.clone(), r.listener.clone()))
            .collect();

        let mut report = DispatchReport::default();
        for (id, key, listener) in snapshot {
            // Skip listeners removed by an earlier callback in this same dispatch
            if !self.is_registered(id) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    warn!(listener = %key, event_id = %event.id(), error = %e, "Sync listener failed");
                }
                Err(_) => {
                    report.failed += 1;
                    warn!(listener = %key, event_id = %event.id(), "Sync listener panicked");
                }
            }
        }
        report
    }

    fn is_registered(&self, id: u64) -> bool {
        self.registrations.read().iter().any(|r| r.id == id)
    }
}
