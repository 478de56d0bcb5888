//! Storage error types.
//!
//! Returned by every [`MessageCache`](crate::MessageCache) operation.

use chat_core::{MessageStatus, TransitionError};
use thiserror::Error;

/// Errors that can occur when using cache operations.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid status transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: MessageStatus,
        to: MessageStatus,
    },
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    pub(crate) fn transition(id: &str, err: TransitionError) -> Self {
        StorageError::InvalidTransition {
            id: id.to_string(),
            from: err.from,
            to: err.to,
        }
    }

    pub(crate) fn not_found(conversation_id: &str, id: &str) -> Self {
        StorageError::NotFound(format!("message {} in conversation {}", id, conversation_id))
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}
