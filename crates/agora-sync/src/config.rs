//! Configuration for the sync engine

use std::collections::HashMap;
use std::time::Duration;

use agora_core::{RowFilter, Topic};
use serde::{Deserialize, Serialize};

use crate::backoff::ReconnectPolicy;

/// Default maximum number of events held offline
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Store key of the persisted offline queue
pub const DEFAULT_QUEUE_KEY: &str = "agora.sync.offline_queue";

/// Store key of the last-sync diagnostic marker
pub const DEFAULT_LAST_SYNC_KEY: &str = "agora.sync.last_sync_at";

/// Configuration for a [`SyncEngine`](crate::SyncEngine)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Topics to subscribe to, in subscription order
    pub topics: Vec<Topic>,
    /// Optional backend-side filter per topic
    pub filters: HashMap<Topic, RowFilter>,
    /// Retry policy for failed or lost subscriptions
    pub reconnect: ReconnectPolicy,
    /// Maximum events kept in the offline queue (oldest evicted first)
    pub queue_capacity: usize,
    /// Store key for the offline queue record
    pub queue_key: String,
    /// Store key for the last-sync marker
    pub last_sync_key: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            topics: Topic::ALL.to_vec(),
            filters: HashMap::new(),
            reconnect: ReconnectPolicy::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            queue_key: DEFAULT_QUEUE_KEY.to_string(),
            last_sync_key: DEFAULT_LAST_SYNC_KEY.to_string(),
        }
    }
}

impl SyncConfig {
    /// Set the topics to follow
    pub fn with_topics(mut self, topics: impl IntoIterator<Item = Topic>) -> Self {
        self.topics = topics.into_iter().collect();
        self
    }

    /// Attach a backend-side filter to one topic
    pub fn with_filter(mut self, topic: Topic, filter: RowFilter) -> Self {
        self.filters.insert(topic, filter);
        self
    }

    /// Set the reconnect policy
    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Set the retry base delay, keeping the attempt ceiling
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.reconnect.base_delay = base_delay;
        self
    }

    /// Set the offline queue capacity
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Use a key prefix, so several engines can share one store
    pub fn with_key_prefix(mut self, prefix: &str) -> Self {
        self.queue_key = format!("{}.offline_queue", prefix);
        self.last_sync_key = format!("{}.last_sync_at", prefix);
        self
    }
}
