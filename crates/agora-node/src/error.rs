//! Error types for the node coordinator

use thiserror::Error;

/// Errors that can occur in the node coordinator
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Storage error: {0}")]
    Storage(#[from] agora_core::StorageError),

    #[error("Sync error: {0}")]
    Sync(#[from] agora_sync::SyncError),

    #[error("Ranking error: {0}")]
    Ranking(#[from] agora_ranking::RankingError),

    #[error("Referral error: {0}")]
    Referral(#[from] agora_referral::ReferralError),

    #[error("Node not started")]
    NotStarted,

    #[error("Node already started")]
    AlreadyStarted,
}

/// Result type alias for node operations
pub type NodeResult<T> = Result<T, NodeError>;
