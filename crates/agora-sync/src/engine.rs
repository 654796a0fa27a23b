//! The sync engine
//!
//! Owns the topic subscriptions, the connection state machine, the reconnect
//! timer, the listener registry, and the offline queue. A [`SyncEngine`] is
//! a cheap cloneable handle; all clones drive the same engine.
//!
//! ## Task layout
//!
//! - One pump task per subscribed topic forwards converted events to
//!   the engine's emit path.
//! - At most one retry task sleeps out the current backoff delay.
//!
//! Both hold a `Weak` reference, so dropping the last handle stops them.
//! Lifecycle transitions run under a single async mutex, and every connect
//! attempt or teardown bumps a generation counter; a task that wakes up
//! holding an older generation does nothing.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use agora_core::{
    ChangeFeedClient, PersistentStore, RowChange, SubscriptionHandle, SyncEvent, Topic,
};
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use crate::config::SyncConfig;
use crate::convert::to_sync_event;
use crate::error::{ListenerError, SyncError, SyncResult};
use crate::listeners::{ListenerHandle, ListenerRegistry};
use crate::queue::{OfflineQueue, Submission};
use crate::state::ConnectionState;

/// Subscription bookkeeping guarded by the lifecycle mutex
#[derive(Default)]
struct Control {
    subscriptions: Vec<SubscriptionHandle>,
    pumps: Vec<JoinHandle<()>>,
    retry: Option<JoinHandle<()>>,
}

struct EngineInner {
    feed: Arc<dyn ChangeFeedClient>,
    store: Arc<dyn PersistentStore>,
    config: SyncConfig,
    listeners: ListenerRegistry,
    queue: OfflineQueue,
    state_tx: watch::Sender<ConnectionState>,
    control: Mutex<Control>,
    generation: AtomicU64,
    /// Consecutive failed connect attempts since the last success or cleanup
    failures: AtomicU32,
}

/// Real-time synchronization engine
///
/// ## Example
///
/// ```rust,ignore
/// let engine = SyncEngine::new(feed, store, SyncConfig::default());
/// engine.register("feed-view", |event| {
///     println!("{} {:?}", event.kind(), event.subject_id());
///     Ok(())
/// });
/// engine.initialize().await?;
/// ```
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

impl SyncEngine {
    /// Create a disconnected engine
    pub fn new(
        feed: Arc<dyn ChangeFeedClient>,
        store: Arc<dyn PersistentStore>,
        config: SyncConfig,
    ) -> Self {
        let queue = OfflineQueue::new(
            store.clone(),
            config.queue_key.clone(),
            config.queue_capacity,
        );
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            inner: Arc::new(EngineInner {
                feed,
                store,
                config,
                listeners: ListenerRegistry::new(),
                queue,
                state_tx,
                control: Mutex::new(Control::default()),
                generation: AtomicU64::new(0),
                failures: AtomicU32::new(0),
            }),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Subscribe to every configured topic and replay the offline queue
    ///
    /// Does nothing if already connected. On failure the engine is left in
    /// [`ConnectionState::Error`] with a retry scheduled (unless the retry
    /// budget is spent) and the error is returned.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> SyncResult<()> {
        let mut control = self.inner.control.lock().await;
        if self.inner.state().is_connected() {
            debug!("Sync engine already connected");
            return Ok(());
        }
        if let Some(retry) = control.retry.take() {
            retry.abort();
        }
        self.inner.connect_locked(&mut control).await
    }

    /// Tear down all subscriptions and timers and drop every listener
    ///
    /// Safe to call repeatedly. Queued events stay persisted for the next
    /// session.
    #[instrument(skip(self))]
    pub async fn cleanup(&self) {
        let mut control = self.inner.control.lock().await;
        if let Some(retry) = control.retry.take() {
            retry.abort();
        }
        self.inner.teardown_locked(&mut control).await;
        self.inner.failures.store(0, Ordering::SeqCst);
        self.inner.set_state(ConnectionState::Disconnected);
        self.inner.listeners.clear();
        info!("Sync engine cleaned up");
    }

    /// Full teardown followed by a fresh connect with a renewed retry budget
    ///
    /// Listeners are dropped by the teardown and must be registered again.
    pub async fn force_sync_refresh(&self) -> SyncResult<()> {
        self.cleanup().await;
        self.initialize().await
    }

    /// Register a listener under `key`
    pub fn register<F>(&self, key: impl Into<String>, listener: F) -> ListenerHandle
    where
        F: Fn(&SyncEvent) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.inner.listeners.register(key, listener)
    }

    /// Remove one listener
    pub fn unregister(&self, handle: &ListenerHandle) -> bool {
        self.inner.listeners.unregister(handle)
    }

    /// Remove every listener under `key`
    pub fn unregister_key(&self, key: &str) -> usize {
        self.inner.listeners.unregister_key(key)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    /// Watch connection state changes
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Consecutive failed connect attempts
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.failures.load(Ordering::SeqCst)
    }

    /// Whether a retry timer is pending
    pub async fn retry_pending(&self) -> bool {
        self.inner
            .control
            .lock()
            .await
            .retry
            .as_ref()
            .is_some_and(|retry| !retry.is_finished())
    }

    /// Number of events waiting in the offline queue
    pub async fn queued_len(&self) -> usize {
        self.inner.queue.len().await
    }

    /// Whether persistence has failed and the queue runs memory-only
    pub fn is_degraded(&self) -> bool {
        self.inner.queue.is_degraded()
    }

    /// Time of the last live delivery, if recorded
    pub async fn last_sync_at(&self) -> SyncResult<Option<DateTime<Utc>>> {
        let raw = self.inner.store.get(&self.inner.config.last_sync_key).await?;
        Ok(raw.and_then(|raw| match DateTime::parse_from_rfc3339(&raw) {
            Ok(at) => Some(at.with_timezone(&Utc)),
            Err(e) => {
                debug!(error = %e, "Ignoring malformed last-sync marker");
                None
            }
        }))
    }

    /// Deliver or queue an event as if it had come from the feed
    pub async fn emit(&self, event: SyncEvent) -> Submission {
        self.inner.emit(event).await
    }
}

impl EngineInner {
    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state_tx.send_replace(next);
        if previous == next {
            return;
        }
        if !previous.can_transition_to(next) {
            warn!(from = %previous, to = %next, "Unexpected connection state transition");
        }
        debug!(from = %previous, to = %next, "Connection state changed");
        self.listeners
            .dispatch(&SyncEvent::connection_changed(next.as_str()));
    }

    /// One connect attempt; caller holds the lifecycle lock
    async fn connect_locked(self: &Arc<Self>, control: &mut Control) -> SyncResult<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.set_state(ConnectionState::Connecting);

        for &topic in &self.config.topics {
            let filter = self.config.filters.get(&topic).cloned();
            match self.feed.subscribe(topic, filter).await {
                Ok(subscription) => {
                    debug!(topic = %topic, handle = %subscription.handle, "Subscribed");
                    control.subscriptions.push(subscription.handle);
                    control
                        .pumps
                        .push(self.spawn_pump(topic, generation, subscription.changes));
                }
                Err(source) => {
                    warn!(topic = %topic, error = %source, "Subscription failed");
                    let scheduled = self.fail_locked(control).await;
                    return Err(if scheduled {
                        SyncError::Subscribe { topic, source }
                    } else {
                        SyncError::RetriesExhausted {
                            attempts: self.failures.load(Ordering::SeqCst),
                        }
                    });
                }
            }
        }

        let replayed = self
            .queue
            .drain_and_go_live(|event| {
                self.listeners.dispatch(event);
            })
            .await;
        if replayed > 0 {
            info!(replayed, "Replayed offline queue");
            self.touch_last_sync().await;
        }

        self.failures.store(0, Ordering::SeqCst);
        self.set_state(ConnectionState::Connected);
        info!(topics = self.config.topics.len(), "Sync engine connected");
        Ok(())
    }

    /// Record a failure and schedule the next attempt
    ///
    /// Returns false once the retry budget is spent.
    async fn fail_locked(self: &Arc<Self>, control: &mut Control) -> bool {
        self.teardown_locked(control).await;
        let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
        self.set_state(ConnectionState::Error);

        match self.config.reconnect.delay_for(failures) {
            Some(delay) => {
                info!(attempt = failures, delay_ms = delay.as_millis() as u64, "Scheduling reconnect");
                let generation = self.generation.load(Ordering::SeqCst);
                control.retry = Some(self.spawn_retry(delay, generation));
                true
            }
            None => {
                warn!(failures, "Reconnect attempts exhausted; waiting for a forced refresh");
                false
            }
        }
    }

    /// Drop subscriptions and stop live delivery; caller holds the lifecycle lock
    async fn teardown_locked(&self, control: &mut Control) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.queue.go_offline().await;

        for pump in control.pumps.drain(..) {
            pump.abort();
        }
        for handle in control.subscriptions.drain(..) {
            if let Err(e) = self.feed.unsubscribe(handle).await {
                debug!(handle = %handle, error = %e, "Unsubscribe failed");
            }
        }
    }

    fn spawn_retry(self: &Arc<Self>, delay: Duration, generation: u64) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.retry(generation).await;
            }
        })
    }

    async fn retry(self: &Arc<Self>, generation: u64) {
        let mut control = self.control.lock().await;
        if self.generation.load(Ordering::SeqCst) != generation
            || self.state() != ConnectionState::Error
        {
            debug!(generation, "Ignoring stale reconnect timer");
            return;
        }
        // This task is the pending retry; detach rather than abort it
        control.retry = None;
        if let Err(e) = self.connect_locked(&mut control).await {
            debug!(error = %e, "Reconnect attempt failed");
        }
    }

    fn spawn_pump(
        self: &Arc<Self>,
        topic: Topic,
        generation: u64,
        mut changes: mpsc::UnboundedReceiver<RowChange>,
    ) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(change) = changes.recv().await {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if inner.generation.load(Ordering::SeqCst) != generation {
                    return;
                }
                if let Some(event) = to_sync_event(topic, &change) {
                    trace!(topic = %topic, kind = %event.kind(), "Feed event");
                    inner.emit(event).await;
                }
            }
            if let Some(inner) = weak.upgrade() {
                inner.on_channel_lost(topic, generation);
            }
        })
    }

    /// Treat a closed change stream like a failed subscription
    ///
    /// Runs on its own task because the failure path aborts every pump,
    /// including the one reporting the loss.
    fn on_channel_lost(self: &Arc<Self>, topic: Topic, generation: u64) {
        let inner = self.clone();
        tokio::spawn(async move {
            let mut control = inner.control.lock().await;
            if inner.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            warn!(topic = %topic, "Change feed channel lost");
            inner.fail_locked(&mut control).await;
        });
    }

    async fn emit(&self, event: SyncEvent) -> Submission {
        let submission = self
            .queue
            .submit(event, |event| {
                self.listeners.dispatch(event);
            })
            .await;
        match submission {
            Submission::Delivered => self.touch_last_sync().await,
            Submission::Queued { evicted } => {
                debug!(evicted, "Event queued while offline");
            }
        }
        submission
    }

    async fn touch_last_sync(&self) {
        let now = Utc::now().to_rfc3339();
        if let Err(e) = self.store.set(&self.config.last_sync_key, now).await {
            debug!(error = %e, "Failed to record last-sync marker");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::{MockChangeFeed, SyncEventKind};
    use agora_storage::InMemoryStore;
    use parking_lot::Mutex as SyncMutex;
    use serde_json::json;

    fn engine_with(feed: Arc<MockChangeFeed>, store: Arc<InMemoryStore>) -> SyncEngine {
        SyncEngine::new(feed, store, SyncConfig::default())
    }

    fn recorder(engine: &SyncEngine) -> Arc<SyncMutex<Vec<SyncEvent>>> {
        let seen = Arc::new(SyncMutex::new(Vec::new()));
        let sink = seen.clone();
        engine.register("recorder", move |event| {
            sink.lock().push(event.clone());
            Ok(())
        });
        seen
    }

    fn item_kinds(seen: &[SyncEvent]) -> Vec<SyncEventKind> {
        seen.iter()
            .map(|e| e.kind())
            .filter(|k| k.is_item_event())
            .collect()
    }

    #[tokio::test]
    async fn test_initialize_subscribes_every_topic() {
        let feed = Arc::new(MockChangeFeed::new());
        let engine = engine_with(feed.clone(), Arc::new(InMemoryStore::new()));

        engine.initialize().await.unwrap();
        assert_eq!(engine.state(), ConnectionState::Connected);
        assert_eq!(feed.active_subscriptions(), 3);

        // Idempotent while connected
        engine.initialize().await.unwrap();
        assert_eq!(feed.subscribe_calls(), 3);
    }

    #[tokio::test]
    async fn test_offline_emit_is_queued_then_replayed() {
        let feed = Arc::new(MockChangeFeed::new());
        let store = Arc::new(InMemoryStore::new());
        let engine = engine_with(feed, store);
        let seen = recorder(&engine);

        let event = SyncEvent::new(SyncEventKind::ItemUpdated, Some("i1".into()), None, None);
        let outcome = engine.emit(event.clone()).await;
        assert_eq!(outcome, Submission::Queued { evicted: 0 });
        assert_eq!(engine.queued_len().await, 1);
        assert!(item_kinds(&seen.lock()).is_empty());

        engine.initialize().await.unwrap();
        assert_eq!(engine.queued_len().await, 0);

        let seen = seen.lock();
        let replayed: Vec<_> = seen.iter().filter(|e| e.kind().is_item_event()).collect();
        assert_eq!(replayed.len(), 1);
        assert_eq!(replayed[0].id(), event.id());
    }

    #[tokio::test]
    async fn test_connection_events_reach_listeners() {
        let feed = Arc::new(MockChangeFeed::new());
        let engine = engine_with(feed, Arc::new(InMemoryStore::new()));
        let seen = recorder(&engine);

        engine.initialize().await.unwrap();

        let states: Vec<String> = seen
            .lock()
            .iter()
            .filter(|e| e.kind() == SyncEventKind::ConnectionStateChanged)
            .map(|e| e.payload().unwrap()["state"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(states, vec!["connecting", "connected"]);
    }

    #[tokio::test]
    async fn test_live_feed_change_is_delivered() {
        let feed = Arc::new(MockChangeFeed::new());
        let store = Arc::new(InMemoryStore::new());
        let engine = engine_with(feed.clone(), store);

        let (tx, mut rx) = mpsc::unbounded_channel();
        engine.register("probe", move |event| {
            if event.kind().is_item_event() {
                let _ = tx.send(event.clone());
            }
            Ok(())
        });
        engine.initialize().await.unwrap();

        feed.push(Topic::Favorites, RowChange::insert(json!({"item_id": "i4", "user_id": "u1"})));

        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.kind(), SyncEventKind::ItemFavorited);
        assert_eq!(event.subject_id().unwrap().as_str(), "i4");
        assert!(engine.last_sync_at().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent_and_drops_listeners() {
        let feed = Arc::new(MockChangeFeed::new());
        let engine = engine_with(feed.clone(), Arc::new(InMemoryStore::new()));
        recorder(&engine);

        engine.initialize().await.unwrap();
        engine.cleanup().await;
        engine.cleanup().await;

        assert_eq!(engine.state(), ConnectionState::Disconnected);
        assert_eq!(feed.active_subscriptions(), 0);
        assert_eq!(engine.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_force_refresh_resubscribes() {
        let feed = Arc::new(MockChangeFeed::new());
        let engine = engine_with(feed.clone(), Arc::new(InMemoryStore::new()));

        engine.initialize().await.unwrap();
        engine.force_sync_refresh().await.unwrap();

        assert_eq!(engine.state(), ConnectionState::Connected);
        assert_eq!(feed.subscribe_calls(), 6);
        assert_eq!(feed.active_subscriptions(), 3);
    }

    #[tokio::test]
    async fn test_failed_attempt_schedules_retry() {
        let feed = Arc::new(MockChangeFeed::new());
        let engine = SyncEngine::new(
            feed.clone(),
            Arc::new(InMemoryStore::new()),
            SyncConfig::default().with_topics([Topic::Items]),
        );
        feed.fail_next_subscribes(1);

        let err = engine.initialize().await.unwrap_err();
        assert!(matches!(err, SyncError::Subscribe { topic: Topic::Items, .. }));
        assert_eq!(engine.state(), ConnectionState::Error);
        assert_eq!(engine.reconnect_attempts(), 1);
        assert!(engine.retry_pending().await);
        assert_eq!(feed.active_subscriptions(), 0);

        engine.cleanup().await;
        assert!(!engine.retry_pending().await);
    }
}
