//! Engine error type.
//!
//! `Network` is the only kind the write protocol produces on its own; `NotFound` comes from the
//! diagnostic read path. Storage failures are passed through unchanged.

use remote_client::NetworkError;
use storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(StorageError),

    #[error("Analysis cancelled for conversation {0}")]
    Cancelled(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<StorageError> for SyncError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(what) => SyncError::NotFound(what),
            other => SyncError::Storage(other),
        }
    }
}

/// Result type for engine operations; uses [`SyncError`].
pub type Result<T> = std::result::Result<T, SyncError>;
