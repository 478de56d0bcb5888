//! # Message cache
//!
//! [`MessageCache`] is the local, queryable store of [`MessageRecord`]s and the only read path for
//! subscribers. Records are addressed by `(conversation_id, id)`. Every mutation that touches a
//! conversation is followed by exactly one ordered snapshot pushed to that conversation's
//! subscribers, so observers see each write as a single transition.
//!
//! ## Ordering
//!
//! Snapshots are ordered by `timestamp`, ties broken by first insertion. Replacing a record by id
//! (upsert or promotion) keeps its original insertion position.
//!
//! ## Status rules
//!
//! Status changes go through the [`MessageStatus`] transition table. An upsert over an existing
//! record must either keep its status or make an allowed transition, so a `Sent` record can never
//! be downgraded by a late write.
//!
//! ## Implementations
//!
//! - [`InMemoryMessageCache`](crate::InMemoryMessageCache): arena behind a tokio `RwLock`
//! - [`SqliteMessageCache`](crate::SqliteMessageCache): durable SQLite table via sqlx

use async_trait::async_trait;
use chat_core::{MessageRecord, MessageStatus};

use crate::error::StorageError;
use crate::subscription::SnapshotStream;

/// Local store of message records, keyed by conversation and id.
#[async_trait]
pub trait MessageCache: Send + Sync {
    /// Inserts or replaces a record by id.
    async fn upsert(&self, record: MessageRecord) -> Result<(), StorageError>;

    /// Bulk variant of [`upsert`](Self::upsert); one snapshot per affected conversation.
    async fn upsert_all(&self, records: Vec<MessageRecord>) -> Result<(), StorageError>;

    /// Removes every record of a conversation. Returns the number removed.
    async fn delete_by_conversation(&self, conversation_id: &str) -> Result<u64, StorageError>;

    /// Changes only the status of a record, subject to the transition table.
    async fn update_status(
        &self,
        conversation_id: &str,
        id: &str,
        status: MessageStatus,
    ) -> Result<MessageRecord, StorageError>;

    /// Atomically re-keys the record stored under `old_id` to `new_id` and sets its status.
    ///
    /// If a record already exists under `new_id` it is replaced, never duplicated.
    async fn promote(
        &self,
        conversation_id: &str,
        old_id: &str,
        new_id: &str,
        status: MessageStatus,
    ) -> Result<MessageRecord, StorageError>;

    /// Replaces the confirmed (`Sent`) records of a conversation with `records` in one transition,
    /// keeping `Sending` and `Failed` records in place.
    async fn replace_confirmed(
        &self,
        conversation_id: &str,
        records: Vec<MessageRecord>,
    ) -> Result<(), StorageError>;

    /// Looks up a single record.
    async fn get(&self, conversation_id: &str, id: &str)
        -> Result<Option<MessageRecord>, StorageError>;

    /// One-shot ordered read of a conversation.
    async fn snapshot_by_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<MessageRecord>, StorageError>;

    /// Live ordered view: yields the current snapshot first, then one snapshot per mutation.
    async fn observe_by_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<SnapshotStream, StorageError>;
}

/// Checks that writing `incoming` over `existing` respects the status transition table.
pub(crate) fn check_overwrite(
    existing: Option<MessageStatus>,
    incoming: &MessageRecord,
) -> Result<(), StorageError> {
    match existing {
        Some(current) if current != incoming.status => current
            .transition(incoming.status)
            .map(|_| ())
            .map_err(|e| StorageError::transition(&incoming.id, e)),
        _ => Ok(()),
    }
}
