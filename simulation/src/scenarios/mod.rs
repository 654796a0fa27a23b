//! Pre-defined simulation scenarios
//!
//! Each scenario takes a plain parameter struct and returns a report that
//! prints as a human-readable table or serializes to JSON.

pub mod rank;
pub mod sync;
pub mod tiers;

pub use rank::{RankReport, RankScenario, run_rank};
pub use sync::{SyncReport, SyncScenario, is_success, run_sync};
pub use tiers::{TierReport, TierScenario, TierStep, run_tiers};
