//! Storage crate: the local message cache and its live subscriptions.
//!
//! ## Modules
//!
//! - [`error`] – Storage error types
//! - [`cache`] – MessageCache trait (upsert, promote, status updates, snapshots, observe)
//! - [`inmemory_cache`] – InMemoryMessageCache (arena behind a RwLock)
//! - [`sqlite_cache`] – SqliteMessageCache (durable, sqlx)
//! - [`subscription`] – SubscriberHub, ConversationSnapshot, SnapshotStream
//! - [`sqlite_pool`] – SqlitePoolManager

mod cache;
mod error;
mod inmemory_cache;
mod models;
mod sqlite_cache;
mod sqlite_pool;
mod subscription;


pub use cache::MessageCache;
pub use error::StorageError;
pub use inmemory_cache::InMemoryMessageCache;
pub use sqlite_cache::SqliteMessageCache;
pub use sqlite_pool::SqlitePoolManager;
pub use subscription::{ConversationSnapshot, SnapshotStream, SubscriberHub};
