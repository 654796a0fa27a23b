//! Error types shared across the Agora engines

use thiserror::Error;

/// Top-level error type for the Agora collaborators
#[derive(Debug, Error)]
pub enum AgoraError {
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),
}

/// Errors raised by the change feed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FeedError {
    #[error("Subscription to {topic} failed: {reason}")]
    SubscribeFailed { topic: String, reason: String },

    #[error("Unknown subscription handle: {0}")]
    UnknownHandle(u64),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Connection timed out")]
    TimedOut,
}

/// Errors raised by a persistent store
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl StorageError {
    /// Create a new I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    /// Create a new Unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// Errors raised by a points lookup
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Lookup backend unavailable")]
    Unavailable,
}

/// Result type alias for collaborator operations
pub type AgoraResult<T> = Result<T, AgoraError>;
