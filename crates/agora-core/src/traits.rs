//! Collaborator traits
//!
//! These are the only seams between the engines and the outside world.
//!
//! ## Key Traits
//!
//! - [`ChangeFeedClient`]: Remote row-change subscriptions
//! - [`PersistentStore`]: Offline queue and marker persistence
//! - [`PointsLookup`]: Incentive points for ranking
//! - [`Clock`]: Time abstraction for testability

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::{FeedError, LookupError, StorageError};
use crate::feed::{FeedSubscription, RowFilter, SubscriptionHandle, Topic};
use crate::ids::UserId;

/// The remote backend's subscription mechanism
#[async_trait]
pub trait ChangeFeedClient: Send + Sync {
    /// Open a subscription on a topic, optionally filtered by the backend
    async fn subscribe(
        &self,
        topic: Topic,
        filter: Option<RowFilter>,
    ) -> Result<FeedSubscription, FeedError>;

    /// Close a subscription
    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), FeedError>;
}

/// Simple async key-value store that survives process restarts
///
/// Every operation may fail; callers decide whether failure is fatal.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    /// Read a value, `None` if the key was never set or was removed
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value stored under `key`
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;

    /// Remove `key`; removing a missing key is not an error
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Batched lookup of users' current total points
///
/// Implementations may return a partial map. Users missing from the result
/// are treated as having no points.
#[async_trait]
pub trait PointsLookup: Send + Sync {
    async fn points_for_users(
        &self,
        user_ids: &[UserId],
    ) -> Result<HashMap<UserId, u64>, LookupError>;
}

/// Time abstraction for testability
pub trait Clock: Send + Sync {
    /// Get the current UTC datetime
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Real clock implementation using system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// Jump to an absolute time
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write() = now;
    }

    /// Move forward by `by`
    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.write();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

/// Lookup backed by a fixed map, for tests and simulation
#[derive(Debug, Default)]
pub struct StaticPointsLookup {
    points: HashMap<UserId, u64>,
}

impl StaticPointsLookup {
    pub fn new(points: HashMap<UserId, u64>) -> Self {
        Self { points }
    }
}

#[async_trait]
impl PointsLookup for StaticPointsLookup {
    async fn points_for_users(
        &self,
        user_ids: &[UserId],
    ) -> Result<HashMap<UserId, u64>, LookupError> {
        Ok(user_ids
            .iter()
            .filter_map(|id| self.points.get(id).map(|p| (id.clone(), *p)))
            .collect())
    }
}
