//! Flaky feed: events pile up offline, the feed recovers after a number of
//! failed subscribes, and the queue is replayed before `Connected`

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use agora_core::{MockChangeFeed, RowChange, SyncEvent, SyncEventKind, Topic};
use agora_node::{AgoraNode, NodeConfig};
use agora_referral::InMemoryReferralStore;
use agora_storage::InMemoryStore;
use agora_sync::{ConnectionState, ReconnectPolicy, Submission, SyncConfig};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use tokio::time::{Instant, sleep, timeout};
use tracing::{info, warn};

/// How long live changes may take to reach the listener
const LIVE_DELIVERY_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct SyncScenario {
    /// Subscribe calls that fail before the feed recovers
    pub initial_failures: u32,
    /// Events emitted while disconnected
    pub offline_events: usize,
    /// Changes pushed through the feed once connected
    pub live_changes: usize,
    pub queue_capacity: usize,
    pub reconnect: ReconnectPolicy,
}

impl Default for SyncScenario {
    fn default() -> Self {
        Self {
            initial_failures: 3,
            offline_events: 10,
            live_changes: 3,
            queue_capacity: 100,
            reconnect: ReconnectPolicy::new(Duration::from_millis(100), 5),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub connected: bool,
    pub final_state: String,
    pub subscribe_calls: usize,
    pub queued_offline: usize,
    pub evicted: usize,
    /// Item events delivered by the drain, before `Connected`
    pub replayed: usize,
    pub live_delivered: usize,
    /// Connection states in the order listeners saw them
    pub state_changes: Vec<String>,
    pub store_writes: usize,
    pub elapsed_ms: u128,
}

pub async fn run_sync(scenario: &SyncScenario) -> anyhow::Result<SyncReport> {
    info!(
        failures = scenario.initial_failures,
        offline_events = scenario.offline_events,
        "Running sync scenario"
    );
    let started = Instant::now();

    let feed = Arc::new(MockChangeFeed::new());
    feed.fail_next_subscribes(scenario.initial_failures);
    let store = Arc::new(InMemoryStore::new());
    let config = NodeConfig::default().with_sync(
        SyncConfig::default()
            .with_reconnect(scenario.reconnect)
            .with_queue_capacity(scenario.queue_capacity),
    );
    let node = AgoraNode::with_store(
        config,
        feed.clone(),
        Arc::new(InMemoryReferralStore::new()),
        store.clone(),
    )?;

    let items = Arc::new(AtomicUsize::new(0));
    let states = Arc::new(Mutex::new(Vec::new()));
    {
        let items = items.clone();
        let states = states.clone();
        node.sync().register("simulation", move |event| {
            if event.kind() == SyncEventKind::ConnectionStateChanged {
                if let Some(state) = event.payload().and_then(|p| p["state"].as_str()) {
                    states.lock().push(state.to_string());
                }
            } else {
                items.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        });
    }

    let mut evicted = 0;
    for n in 0..scenario.offline_events {
        let event = SyncEvent::new(
            SyncEventKind::ItemViewed,
            Some(format!("item-{}", n).into()),
            Some("visitor".into()),
            None,
        );
        if let Submission::Queued { evicted: dropped } = node.sync().emit(event).await {
            evicted += dropped;
        }
    }
    let queued_offline = node.sync().queued_len().await;

    if let Err(e) = node.start().await {
        warn!(error = %e, "Initial connect failed; waiting for retries");
    }

    let budget = scenario.reconnect.schedule().iter().sum::<Duration>() + scenario.reconnect.base_delay;
    let mut watch = node.sync().watch_state();
    let connected = timeout(budget, watch.wait_for(|state| state.is_connected()))
        .await
        .is_ok_and(|waited| waited.is_ok());
    let replayed = items.load(Ordering::SeqCst);

    let mut live_delivered = 0;
    if connected {
        for n in 0..scenario.live_changes {
            feed.push(
                Topic::Items,
                RowChange::insert(json!({"id": format!("live-{}", n), "seller_id": "seller"})),
            );
        }
        let target = replayed + scenario.live_changes;
        let _ = timeout(LIVE_DELIVERY_TIMEOUT, async {
            while items.load(Ordering::SeqCst) < target {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        live_delivered = items.load(Ordering::SeqCst) - replayed;
    } else {
        warn!(attempts = node.sync().reconnect_attempts(), "Feed never recovered");
    }

    let final_state = node.sync().state();
    let state_changes = states.lock().clone();
    node.shutdown().await?;

    Ok(SyncReport {
        connected,
        final_state: final_state.as_str().to_string(),
        subscribe_calls: feed.subscribe_calls(),
        queued_offline,
        evicted,
        replayed,
        live_delivered,
        state_changes,
        store_writes: store.write_count(),
        elapsed_ms: started.elapsed().as_millis(),
    })
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Sync Scenario ===")?;
        writeln!(f, "  connected:        {}", self.connected)?;
        writeln!(f, "  final state:      {}", self.final_state)?;
        writeln!(f, "  subscribe calls:  {}", self.subscribe_calls)?;
        writeln!(f, "  queued offline:   {} ({} evicted)", self.queued_offline, self.evicted)?;
        writeln!(f, "  replayed:         {}", self.replayed)?;
        writeln!(f, "  live delivered:   {}", self.live_delivered)?;
        writeln!(f, "  store writes:     {}", self.store_writes)?;
        writeln!(f, "  elapsed:          {} ms", self.elapsed_ms)?;
        write!(f, "  states:           {}", self.state_changes.join(" -> "))
    }
}

/// Whether the run ended connected
pub fn is_success(report: &SyncReport) -> bool {
    report.connected && report.final_state == ConnectionState::Connected.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test(start_paused = true)]
    async fn test_recovers_and_replays_everything() {
        let report = assert_ok!(run_sync(&SyncScenario::default()).await);

        assert!(is_success(&report));
        assert_eq!(report.queued_offline, 10);
        assert_eq!(report.replayed, 10);
        assert_eq!(report.live_delivered, 3);
        // 3 topics on the successful attempt plus one failed call per failure
        assert_eq!(report.subscribe_calls, 3 + 3);
        assert_eq!(report.state_changes.last().map(String::as_str), Some("connected"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_small_queue_evicts_oldest() {
        let scenario = SyncScenario {
            initial_failures: 0,
            offline_events: 8,
            queue_capacity: 5,
            ..SyncScenario::default()
        };
        let report = assert_ok!(run_sync(&scenario).await);

        assert_eq!(report.queued_offline, 5);
        assert_eq!(report.evicted, 3);
        assert_eq!(report.replayed, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_budget() {
        let scenario = SyncScenario {
            initial_failures: 50,
            live_changes: 0,
            ..SyncScenario::default()
        };
        let report = assert_ok!(run_sync(&scenario).await);

        assert!(!report.connected);
        assert_eq!(report.final_state, "error");
        assert_eq!(report.replayed, 0);
        // The initial attempt plus five retries
        assert_eq!(report.subscribe_calls, 6);
    }
}
