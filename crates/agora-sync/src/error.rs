//! Sync-specific error types

use agora_core::{FeedError, StorageError, Topic};
use thiserror::Error;

/// Errors that can occur in the sync engine
///
/// None of these escape event emission; they are returned from lifecycle
/// calls so callers can tell a failed first attempt from success.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Opening a topic subscription failed
    #[error("Subscription to {topic} failed: {source}")]
    Subscribe {
        topic: Topic,
        #[source]
        source: FeedError,
    },

    /// The persistent store failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The reconnect budget is spent; only a forced refresh resumes syncing
    #[error("Reconnect attempts exhausted after {attempts} failures")]
    RetriesExhausted { attempts: u32 },
}

/// Error returned by a sync listener
///
/// Listener failures are logged and never stop dispatch to other listeners.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ListenerError(pub String);

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Result type alias for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
