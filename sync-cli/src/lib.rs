//! # sync-cli
//!
//! `chatsync` front end: argument parsing, config loading, engine wiring and output rendering.

pub mod app;
pub mod cli;
pub mod config;
pub mod render;


pub use cli::{Cli, Commands};
pub use config::{AppConfig, CacheBackend};
