//! # Agora Storage
//!
//! [`PersistentStore`] backends for the Agora engines.
//!
//! ## Features
//!
//! - **InMemoryStore**: `DashMap`-backed store with fault injection, for
//!   tests and simulation
//! - **FileStore**: One file per key with atomic replace, for production
//!
//! ## Example
//!
//! ```rust,ignore
//! use agora_core::PersistentStore;
//! use agora_storage::FileStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = FileStore::open("./agora-data/store").await.unwrap();
//!     store.set("greeting", "hello".to_string()).await.unwrap();
//!     assert_eq!(store.get("greeting").await.unwrap().as_deref(), Some("hello"));
//! }
//! ```

pub mod memory;
pub mod persistent;

// Re-exports
pub use memory::InMemoryStore;
pub use persistent::FileStore;

// Re-export the store trait from agora-core for convenience
pub use agora_core::{PersistentStore, StorageError};
