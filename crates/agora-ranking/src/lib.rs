//! # Agora Ranking
//!
//! Orders search candidates by a weighted composite of proximity, price,
//! and the seller's referral points.
//!
//! | criterion | no information | scoring |
//! |-----------|----------------|---------|
//! | proximity | 0.5 | linear decay to 0 at `max_distance_km` |
//! | price | 0.5 | normalized over the batch (widened by the configured range), inverted, `^0.7` |
//! | referral | 0.1 | `0.1 + 0.9 * log10(1 + 9 * points / max_points)` |
//!
//! Criteria are validated before use and never renormalized: weights must
//! each lie in `[0, 1]` and sum to one within 0.001.
//!
//! ## Key Types
//!
//! - [`RankingEngine`]: Batched points lookup plus scoring and stable sort
//! - [`RankingCriteria`]: Weights, distance cutoff, and price range
//! - [`Candidate`] / [`ScoredCandidate`]: Input and output rows
//! - [`DebugConfig`]: Opt-in per-criterion breakdown for tuning

pub mod candidate;
pub mod criteria;
pub mod engine;
pub mod error;
pub mod score;

pub use candidate::{BreakdownRow, Candidate, GeoPoint, Ranking, RankingContext, ScoredCandidate};
pub use criteria::{DebugConfig, PriceRange, RankingCriteria, WEIGHT_TOLERANCE, is_valid_config};
pub use engine::{RankingEngine, score_candidates};
pub use error::{RankingError, RankingResult};
