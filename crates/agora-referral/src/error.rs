//! Referral error types

use agora_core::{RelationshipId, StorageError, UserId};
use thiserror::Error;

/// Errors that can occur in referral accounting
#[derive(Debug, Error)]
pub enum ReferralError {
    /// The referenced relationship does not exist
    #[error("Referral relationship not found: {0}")]
    NotFound(RelationshipId),

    /// The remote referral store failed; nothing was changed locally
    #[error("Referral store error: {0}")]
    Store(#[from] StorageError),

    /// The code is malformed or belongs to nobody
    #[error("Invalid referral code: {0}")]
    InvalidCode(String),

    /// A user tried to redeem their own code
    #[error("Users cannot refer themselves")]
    SelfReferral,

    /// The user already has a referrer
    #[error("User {0} has already been referred")]
    AlreadyReferred(UserId),
}

impl ReferralError {
    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReferralError::Store(_))
    }
}

/// Result type alias for referral operations
pub type ReferralResult<T> = Result<T, ReferralError>;
