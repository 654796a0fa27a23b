//! Mock change feed for testing
//!
//! Provides an in-memory [`ChangeFeedClient`] so synchronization logic can be
//! exercised without a backend, including connection failures.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agora_core::{MockChangeFeed, RowChange, Topic};
//!
//! let feed = MockChangeFeed::new();
//! feed.fail_next_subscribes(2); // first two subscribe calls fail
//!
//! // ... engine subscribes ...
//!
//! feed.push(Topic::Items, RowChange::insert(serde_json::json!({"id": "i1"})));
//! feed.sever_all(); // simulate the socket dropping
//! ```

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::FeedError;
use crate::feed::{FeedSubscription, RowChange, RowFilter, SubscriptionHandle, Topic};
use crate::traits::ChangeFeedClient;

/// One live mock subscription
#[derive(Debug)]
struct MockSubscription {
    topic: Topic,
    filter: Option<RowFilter>,
    sender: mpsc::UnboundedSender<RowChange>,
}

/// An in-memory change feed with fault injection
#[derive(Debug, Default)]
pub struct MockChangeFeed {
    /// Live subscriptions by handle
    subscriptions: DashMap<SubscriptionHandle, MockSubscription>,
    /// Next handle value
    next_handle: AtomicU64,
    /// Number of upcoming subscribe calls that should fail
    fail_next: AtomicU32,
    /// When set, every subscribe call fails
    unavailable: AtomicBool,
    subscribe_calls: AtomicUsize,
    unsubscribe_calls: AtomicUsize,
}

impl MockChangeFeed {
    /// Create a new healthy mock feed
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` subscribe calls fail
    pub fn fail_next_subscribes(&self, count: u32) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Make every subscribe call fail until cleared
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Deliver a change to every live subscription on `topic` whose filter matches
    ///
    /// Returns the number of subscriptions the change was delivered to.
    pub fn push(&self, topic: Topic, change: RowChange) -> usize {
        let mut delivered = 0;
        for entry in self.subscriptions.iter() {
            let sub = entry.value();
            if sub.topic != topic {
                continue;
            }
            if let Some(filter) = &sub.filter
                && !change.current_row().is_some_and(|row| filter.matches(row))
            {
                continue;
            }
            if sub.sender.send(change.clone()).is_ok() {
                delivered += 1;
            }
        }
        trace!(topic = %topic, delivered, "Mock feed pushed change");
        delivered
    }

    /// Drop every live subscription, closing their change streams
    pub fn sever_all(&self) {
        let count = self.subscriptions.len();
        self.subscriptions.clear();
        debug!(count, "Mock feed severed all subscriptions");
    }

    /// Number of live subscriptions
    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.len()
    }

    /// Number of live subscriptions on one topic
    pub fn subscriptions_for(&self, topic: Topic) -> usize {
        self.subscriptions
            .iter()
            .filter(|entry| entry.value().topic == topic)
            .count()
    }

    /// Total subscribe calls, successful or not
    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    /// Total unsubscribe calls
    pub fn unsubscribe_calls(&self) -> usize {
        self.unsubscribe_calls.load(Ordering::SeqCst)
    }

    fn should_fail(&self) -> bool {
        if self.unavailable.load(Ordering::SeqCst) {
            return true;
        }
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ChangeFeedClient for MockChangeFeed {
    async fn subscribe(
        &self,
        topic: Topic,
        filter: Option<RowFilter>,
    ) -> Result<FeedSubscription, FeedError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);

        if self.should_fail() {
            return Err(FeedError::SubscribeFailed {
                topic: topic.to_string(),
                reason: "injected failure".to_string(),
            });
        }

        let handle = SubscriptionHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        let (sender, changes) = mpsc::unbounded_channel();
        self.subscriptions.insert(
            handle,
            MockSubscription {
                topic,
                filter,
                sender,
            },
        );

        Ok(FeedSubscription { handle, changes })
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), FeedError> {
        self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.subscriptions
            .remove(&handle)
            .map(|_| ())
            .ok_or(FeedError::UnknownHandle(handle.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_push_reaches_matching_topic_only() {
        let feed = MockChangeFeed::new();
        let mut items = assert_ok!(feed.subscribe(Topic::Items, None).await);
        let mut views = assert_ok!(feed.subscribe(Topic::Views, None).await);

        assert_eq!(feed.push(Topic::Items, RowChange::insert(json!({"id": "a"}))), 1);

        let change = items.changes.recv().await.unwrap();
        assert_eq!(change.after.unwrap()["id"], "a");
        assert!(views.changes.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_filter_is_applied() {
        let feed = MockChangeFeed::new();
        let mut sub = feed
            .subscribe(Topic::Items, Some(RowFilter::eq("seller_id", "s1")))
            .await
            .unwrap();

        assert_eq!(feed.push(Topic::Items, RowChange::insert(json!({"seller_id": "s2"}))), 0);
        assert_eq!(feed.push(Topic::Items, RowChange::insert(json!({"seller_id": "s1"}))), 1);
        assert_eq!(sub.changes.recv().await.unwrap().after.unwrap()["seller_id"], "s1");
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let feed = MockChangeFeed::new();
        feed.fail_next_subscribes(2);

        assert_err!(feed.subscribe(Topic::Items, None).await);
        assert_err!(feed.subscribe(Topic::Items, None).await);
        assert_ok!(feed.subscribe(Topic::Items, None).await);
        assert_eq!(feed.subscribe_calls(), 3);
    }

    #[tokio::test]
    async fn test_sever_closes_streams() {
        let feed = MockChangeFeed::new();
        let mut sub = feed.subscribe(Topic::Favorites, None).await.unwrap();
        feed.sever_all();
        assert!(sub.changes.recv().await.is_none());
        assert_eq!(feed.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_unknown_handle() {
        let feed = MockChangeFeed::new();
        let err = assert_err!(feed.unsubscribe(SubscriptionHandle(99)).await);
        assert_eq!(err, FeedError::UnknownHandle(99));
    }
}
