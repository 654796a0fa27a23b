//! The unified change notification
//!
//! Raw row changes from every topic are converted into [`SyncEvent`]s so
//! listeners deal with one shape regardless of which table changed.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{EventId, ItemId, UserId};

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncEventKind {
    ItemCreated,
    ItemUpdated,
    ItemDeleted,
    ItemFavorited,
    ItemUnfavorited,
    ItemViewed,
    ConnectionStateChanged,
}

impl SyncEventKind {
    /// Stable snake_case label, matching the serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncEventKind::ItemCreated => "item_created",
            SyncEventKind::ItemUpdated => "item_updated",
            SyncEventKind::ItemDeleted => "item_deleted",
            SyncEventKind::ItemFavorited => "item_favorited",
            SyncEventKind::ItemUnfavorited => "item_unfavorited",
            SyncEventKind::ItemViewed => "item_viewed",
            SyncEventKind::ConnectionStateChanged => "connection_state_changed",
        }
    }

    /// Whether this kind describes an item (as opposed to the connection)
    pub fn is_item_event(&self) -> bool {
        !matches!(self, SyncEventKind::ConnectionStateChanged)
    }
}

impl fmt::Display for SyncEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change notification delivered to sync listeners
///
/// Events are immutable once constructed. The id and timestamp are assigned
/// at emission time; the timestamp is not the delivery time, which can be
/// much later for events replayed from the offline queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEvent {
    id: EventId,
    #[serde(rename = "type")]
    kind: SyncEventKind,
    timestamp: DateTime<Utc>,
    subject_id: Option<ItemId>,
    actor_id: Option<UserId>,
    payload: Option<Value>,
}

impl SyncEvent {
    /// Create an event stamped with a fresh id and the current time
    pub fn new(
        kind: SyncEventKind,
        subject_id: Option<ItemId>,
        actor_id: Option<UserId>,
        payload: Option<Value>,
    ) -> Self {
        Self::at(Utc::now(), kind, subject_id, actor_id, payload)
    }

    /// Create an event with an explicit emission time
    pub fn at(
        timestamp: DateTime<Utc>,
        kind: SyncEventKind,
        subject_id: Option<ItemId>,
        actor_id: Option<UserId>,
        payload: Option<Value>,
    ) -> Self {
        Self {
            id: EventId::generate(),
            kind,
            timestamp,
            subject_id,
            actor_id,
            payload,
        }
    }

    /// Create a connection-state notification; `state` is the new state's label
    pub fn connection_changed(state: &str) -> Self {
        Self::new(
            SyncEventKind::ConnectionStateChanged,
            None,
            None,
            Some(serde_json::json!({ "state": state })),
        )
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn kind(&self) -> SyncEventKind {
        self.kind
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn subject_id(&self) -> Option<&ItemId> {
        self.subject_id.as_ref()
    }

    pub fn actor_id(&self) -> Option<&UserId> {
        self.actor_id.as_ref()
    }

    /// Denormalized snapshot of the affected entity, if the feed supplied one
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }
}
