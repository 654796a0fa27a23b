//! Change-feed data model
//!
//! The remote backend publishes row-level changes per table. These types
//! describe what the feed hands us before any conversion into
//! [`SyncEvent`](crate::SyncEvent)s.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// A logical change-feed stream for one entity type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Items,
    Favorites,
    Views,
}

impl Topic {
    /// Every topic the sync engine follows by default
    pub const ALL: [Topic; 3] = [Topic::Items, Topic::Favorites, Topic::Views];

    /// Name of the backing table
    pub fn table(&self) -> &'static str {
        match self {
            Topic::Items => "items",
            Topic::Favorites => "favorites",
            Topic::Views => "item_views",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Row operation reported by the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RowOperation {
    Insert,
    Update,
    Delete,
}

/// A raw row change notification
///
/// `before` is present for updates and deletes when the backend replicates
/// old rows; `after` is present for inserts and updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowChange {
    pub operation: RowOperation,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

impl RowChange {
    pub fn insert(row: Value) -> Self {
        Self {
            operation: RowOperation::Insert,
            before: None,
            after: Some(row),
        }
    }

    pub fn update(before: Option<Value>, after: Value) -> Self {
        Self {
            operation: RowOperation::Update,
            before,
            after: Some(after),
        }
    }

    pub fn delete(row: Value) -> Self {
        Self {
            operation: RowOperation::Delete,
            before: Some(row),
            after: None,
        }
    }

    /// The most recent image of the row: `after` if present, else `before`
    pub fn current_row(&self) -> Option<&Value> {
        self.after.as_ref().or(self.before.as_ref())
    }
}

/// Equality predicate applied by the backend before changes are delivered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFilter {
    pub column: String,
    pub value: String,
}

impl RowFilter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Whether a row satisfies the predicate
    pub fn matches(&self, row: &Value) -> bool {
        match row.get(&self.column) {
            Some(Value::String(s)) => s == &self.value,
            Some(other) => other.to_string() == self.value,
            None => false,
        }
    }
}

/// Opaque handle identifying one live subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(pub u64);

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// A live subscription returned by the feed
///
/// Changes arrive on `changes` in feed emission order. The stream closing
/// while still subscribed means the backend dropped the channel.
#[derive(Debug)]
pub struct FeedSubscription {
    pub handle: SubscriptionHandle,
    pub changes: mpsc::UnboundedReceiver<RowChange>,
}
