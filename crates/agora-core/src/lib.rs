//! # Agora Core
//!
//! Core traits, types, and errors shared by the Agora marketplace engines.
//!
//! The engines never talk to the remote backend directly. Everything they
//! consume from the outside world goes through the collaborator traits
//! defined here, so the same synchronization and ranking logic runs against
//! the real backend, the mock feed, or an in-memory store.
//!
//! ## Key Traits
//!
//! - [`ChangeFeedClient`]: Row-level change subscriptions per logical table
//! - [`PersistentStore`]: Async string key-value store that survives restarts
//! - [`PointsLookup`]: Batched incentive-points lookup used by ranking
//! - [`Clock`]: Time abstraction for testability
//!
//! ## Key Types
//!
//! - [`SyncEvent`]: The unified change notification delivered to listeners
//! - [`Topic`]: A logical change-feed stream (items, favorites, views)
//! - [`RowChange`]: A raw insert/update/delete notification from the feed
//! - [`MockChangeFeed`]: In-memory feed with fault injection

pub mod error;
pub mod event;
pub mod feed;
pub mod ids;
pub mod mock_feed;
pub mod traits;

// Re-export main types
pub use error::*;
pub use event::*;
pub use feed::*;
pub use ids::*;
pub use mock_feed::*;
pub use traits::*;
