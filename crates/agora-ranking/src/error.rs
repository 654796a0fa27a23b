//! Ranking error types

use thiserror::Error;

/// Errors that can occur when ranking
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RankingError {
    /// The criteria break an invariant and were rejected before use
    #[error("Invalid ranking criteria: {reason}")]
    InvalidCriteria { reason: String },
}

impl RankingError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidCriteria {
            reason: reason.into(),
        }
    }
}

/// Result type alias for ranking operations
pub type RankingResult<T> = Result<T, RankingError>;
