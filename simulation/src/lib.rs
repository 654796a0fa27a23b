//! # Agora Simulation
//!
//! Scenario runner for the Agora engines. Everything runs in process
//! against [`MockChangeFeed`](agora_core::MockChangeFeed) and the in-memory
//! stores, so scenarios are repeatable and need no backend.
//!
//! ## Scenarios
//!
//! - **sync**: A flaky feed that fails the first subscribes while events
//!   pile up offline; shows backoff, replay before `Connected`, and live
//!   delivery afterwards
//! - **rank**: Seeded synthetic candidates ranked around a fixed point, with
//!   the per-criterion debug breakdown
//! - **tiers**: One referrer's award history, tier changes, and absorbed
//!   duplicate awards
//!
//! ## Example
//!
//! ```rust,ignore
//! use agora_simulation::scenarios::{SyncScenario, run_sync};
//!
//! let report = run_sync(&SyncScenario::default()).await?;
//! println!("{}", report);
//! ```

pub mod scenarios;

pub use scenarios::*;
