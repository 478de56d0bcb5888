//! # sync-engine
//!
//! Local-first chat synchronization. [`SyncEngine`] keeps a per-conversation message cache
//! consistent across optimistic local writes, a remote chat service, and any number of live
//! observers.
//!
//! ## Modules
//!
//! - [`engine`] – SyncEngine (send, refresh, analyze, observe)
//! - [`config`] – EngineConfig, RefreshPolicy
//! - [`error`] – SyncError
//! - `gate` – per-conversation send/refresh gates
//! - `single_flight` – per-conversation in-flight markers for analyze

pub mod config;
pub mod engine;
pub mod error;
mod gate;
mod single_flight;


pub use config::{EngineConfig, RefreshPolicy};
pub use engine::SyncEngine;
pub use error::{Result, SyncError};
