//! # Agora Sync
//!
//! Real-time synchronization between the marketplace backend's change feed
//! and in-process listeners, with an offline queue that survives restarts.
//!
//! The engine subscribes to the items, favorites, and views topics, converts
//! raw row changes into [`SyncEvent`](agora_core::SyncEvent)s, and fans them
//! out to registered listeners. While disconnected, events are queued and
//! persisted; on reconnect they are replayed in order before the engine
//! reports [`ConnectionState::Connected`].
//!
//! ## Key Types
//!
//! - [`SyncEngine`]: Lifecycle, listener registry, and event emission
//! - [`SyncConfig`]: Topics, filters, queue capacity, and store keys
//! - [`ReconnectPolicy`]: Bounded exponential backoff
//! - [`ConnectionState`]: Disconnected / Connecting / Connected / Error
//! - [`OfflineQueue`]: Bounded FIFO persisted through a `PersistentStore`
//!
//! ## Delivery guarantees
//!
//! Events are delivered at least once, in emission order per topic. A crash
//! between replaying the queue and clearing its persisted record replays the
//! same events again on the next start, so listeners should be idempotent
//! with respect to [`SyncEvent::id`](agora_core::SyncEvent::id).

pub mod backoff;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod listeners;
pub mod queue;
pub mod state;

pub use backoff::ReconnectPolicy;
pub use config::SyncConfig;
pub use convert::to_sync_event;
pub use engine::SyncEngine;
pub use error::{ListenerError, SyncError, SyncResult};
pub use listeners::{DispatchReport, Listener, ListenerHandle, ListenerRegistry};
pub use queue::{OfflineQueue, Submission};
pub use state::ConnectionState;
