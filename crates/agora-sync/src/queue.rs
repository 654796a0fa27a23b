//! Bounded, persisted offline queue
//!
//! Events that cannot be delivered live are appended here and persisted as
//! one JSON record under a fixed key. On reconnect the queue is replayed in
//! insertion order and the record is removed only after every event has been
//! dispatched.
//!
//! All queue access goes through one async mutex. Live delivery also runs
//! under that mutex, so an emit that races with a drain is either queued
//! before the drain starts or delivered after it finishes, never in between.
//!
//! Delivery is at-least-once: a crash after dispatching but before the
//! record is removed replays the same events on the next start. Listeners
//! must tolerate seeing an event id twice.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use agora_core::{PersistentStore, SyncEvent};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

/// What happened to a submitted event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Dispatched to listeners immediately
    Delivered,
    /// Stored for later; `evicted` older events were dropped to make room
    Queued { evicted: usize },
}

struct QueueState {
    events: VecDeque<SyncEvent>,
    /// Whether submissions are delivered live
    live: bool,
    /// Whether the persisted record has been read this session
    loaded: bool,
}

/// Ordered, size-bounded event queue persisted in a [`PersistentStore`]
pub struct OfflineQueue {
    store: Arc<dyn PersistentStore>,
    key: String,
    capacity: usize,
    state: Mutex<QueueState>,
    /// Set once a persistence error occurs; the queue is memory-only afterwards
    degraded: AtomicBool,
}

impl OfflineQueue {
    /// Create a queue persisted under `key`, holding at most `capacity` events
    pub fn new(store: Arc<dyn PersistentStore>, key: impl Into<String>, capacity: usize) -> Self {
        Self {
            store,
            key: key.into(),
            capacity: capacity.max(1),
            state: Mutex::new(QueueState {
                events: VecDeque::new(),
                live: false,
                loaded: false,
            }),
            degraded: AtomicBool::new(false),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether a persistence error has forced memory-only operation
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// Number of queued events
    pub async fn len(&self) -> usize {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await;
        state.events.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether submissions are currently delivered live
    pub async fn is_live(&self) -> bool {
        self.state.lock().await.live
    }

    /// Copy of the queued events in insertion order
    pub async fn snapshot(&self) -> Vec<SyncEvent> {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await;
        state.events.iter().cloned().collect()
    }

    /// Deliver `event` through `deliver` if live, otherwise queue it
    pub async fn submit<F>(&self, event: SyncEvent, deliver: F) -> Submission
    where
        F: FnOnce(&SyncEvent),
    {
        let mut state = self.state.lock().await;
        if state.live {
            deliver(&event);
            return Submission::Delivered;
        }

        self.ensure_loaded(&mut state).await;
        state.events.push_back(event);
        let mut evicted = 0;
        while state.events.len() > self.capacity {
            if let Some(dropped) = state.events.pop_front() {
                evicted += 1;
                debug!(event_id = %dropped.id(), kind = %dropped.kind(), "Evicted oldest queued event");
            }
        }
        self.persist(&state).await;
        Submission::Queued { evicted }
    }

    /// Replay every queued event through `dispatch`, clear the queue, and go live
    ///
    /// Returns the number of replayed events.
    pub async fn drain_and_go_live<F>(&self, mut dispatch: F) -> usize
    where
        F: FnMut(&SyncEvent),
    {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await;

        let count = state.events.len();
        for event in state.events.iter() {
            dispatch(event);
        }

        // A degraded session may still have a stale record from before the
        // failure; clearing it is attempted even though nothing is persisted
        if count > 0 || self.is_degraded() {
            if let Err(e) = self.store.remove(&self.key).await {
                // The record stays behind and is replayed again next start
                warn!(key = %self.key, error = %e, "Failed to clear persisted offline queue");
                self.mark_degraded();
            }
        }
        state.events.clear();
        state.live = true;
        count
    }

    /// Stop live delivery; later submissions are queued
    pub async fn go_offline(&self) {
        self.state.lock().await.live = false;
    }

    async fn ensure_loaded(&self, state: &mut QueueState) {
        if state.loaded {
            return;
        }
        state.loaded = true;

        let raw = match self.store.get(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to read offline queue; continuing in memory");
                self.mark_degraded();
                return;
            }
        };

        match serde_json::from_str::<Vec<SyncEvent>>(&raw) {
            Ok(persisted) => {
                debug!(count = persisted.len(), "Loaded persisted offline queue");
                // Persisted events predate anything queued in this session
                let session = std::mem::take(&mut state.events);
                state.events = persisted.into_iter().chain(session).collect();
                while state.events.len() > self.capacity {
                    state.events.pop_front();
                }
            }
            Err(e) => {
                error!(key = %self.key, error = %e, "Discarding corrupt offline queue record");
            }
        }
    }

    async fn persist(&self, state: &QueueState) {
        if self.is_degraded() {
            return;
        }
        let record = match serde_json::to_string(&state.events) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Failed to encode offline queue");
                self.mark_degraded();
                return;
            }
        };
        if let Err(e) = self.store.set(&self.key, record).await {
            warn!(key = %self.key, error = %e, "Failed to persist offline queue; continuing in memory");
            self.mark_degraded();
        }
    }

    /// Stop persisting for the rest of the session
    ///
    /// The last successfully written record stays in the store until a
    /// drain manages to remove it.
    fn mark_degraded(&self) {
        self.degraded.store(true, Ordering::SeqCst);
    }
}
