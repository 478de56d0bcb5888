//! # In-memory message cache
//!
//! Arena of conversations (`conversation_id -> id -> record`) behind a single tokio `RwLock`.
//! The lock is the write discipline: each mutation, and the snapshot it publishes, happens under one
//! write guard, so no reader or subscriber can observe a half-applied change.
//!
//! Data is lost on restart; use [`SqliteMessageCache`](crate::SqliteMessageCache) for durability.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chat_core::{MessageRecord, MessageStatus};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::cache::{check_overwrite, MessageCache};
use crate::error::StorageError;
use crate::subscription::{SnapshotStream, SubscriberHub};

#[derive(Debug, Clone)]
struct StoredRecord {
    /// Insertion sequence; tie-breaker for equal timestamps.
    seq: u64,
    record: MessageRecord,
}

#[derive(Debug, Default)]
struct Conversation {
    records: HashMap<String, StoredRecord>,
}

impl Conversation {
    fn ordered(&self) -> Vec<MessageRecord> {
        let mut stored: Vec<&StoredRecord> = self.records.values().collect();
        stored.sort_by(|a, b| {
            a.record
                .timestamp
                .cmp(&b.record.timestamp)
                .then(a.seq.cmp(&b.seq))
        });
        stored.into_iter().map(|s| s.record.clone()).collect()
    }
}

#[derive(Debug, Default)]
struct CacheState {
    conversations: HashMap<String, Conversation>,
    next_seq: u64,
    hub: SubscriberHub,
}

impl CacheState {
    fn snapshot(&self, conversation_id: &str) -> Vec<MessageRecord> {
        self.conversations
            .get(conversation_id)
            .map(Conversation::ordered)
            .unwrap_or_default()
    }

    fn publish(&mut self, conversation_id: &str) {
        if !self.hub.has_subscribers(conversation_id) {
            return;
        }
        let snapshot = self.snapshot(conversation_id);
        self.hub.publish(conversation_id, snapshot);
    }

    fn find(&self, conversation_id: &str, id: &str) -> Option<&StoredRecord> {
        self.conversations.get(conversation_id)?.records.get(id)
    }

    /// Checks a batch up front so a rejected record leaves the state untouched. A record that
    /// repeats an earlier id in the same batch is checked against that earlier record.
    fn validate_all(&self, records: &[MessageRecord]) -> Result<(), StorageError> {
        let mut staged: HashMap<(&str, &str), MessageStatus> = HashMap::new();
        for record in records {
            let key = (record.conversation_id.as_str(), record.id.as_str());
            let existing = staged
                .get(&key)
                .copied()
                .or_else(|| self.find(key.0, key.1).map(|s| s.record.status));
            check_overwrite(existing, record)?;
            staged.insert(key, record.status);
        }
        Ok(())
    }

    /// Inserts or replaces by id, keeping the original sequence on replace.
    fn put(&mut self, record: MessageRecord) -> Result<(), StorageError> {
        let existing = self
            .find(&record.conversation_id, &record.id)
            .map(|s| (s.seq, s.record.status));
        check_overwrite(existing.map(|(_, status)| status), &record)?;

        let seq = match existing {
            Some((seq, _)) => seq,
            None => {
                self.next_seq += 1;
                self.next_seq
            }
        };
        self.conversations
            .entry(record.conversation_id.clone())
            .or_default()
            .records
            .insert(record.id.clone(), StoredRecord { seq, record });
        Ok(())
    }
}

/// Volatile [`MessageCache`] used for tests and ephemeral sessions.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMessageCache {
    state: Arc<RwLock<CacheState>>,
}

impl InMemoryMessageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records across all conversations.
    pub async fn len(&self) -> usize {
        let state = self.state.read().await;
        state.conversations.values().map(|c| c.records.len()).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Live subscribers for a conversation.
    pub async fn subscriber_count(&self, conversation_id: &str) -> usize {
        self.state.write().await.hub.subscriber_count(conversation_id)
    }
}

#[async_trait]
impl MessageCache for InMemoryMessageCache {
    async fn upsert(&self, record: MessageRecord) -> Result<(), StorageError> {
        let conversation_id = record.conversation_id.clone();
        debug!(
            conversation_id = %conversation_id,
            message_id = %record.id,
            status = %record.status,
            "Upserting record"
        );
        let mut state = self.state.write().await;
        state.put(record)?;
        state.publish(&conversation_id);
        Ok(())
    }

    async fn upsert_all(&self, records: Vec<MessageRecord>) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        state.validate_all(&records)?;
        let mut touched: Vec<String> = Vec::new();
        let count = records.len();
        for record in records {
            if !touched.contains(&record.conversation_id) {
                touched.push(record.conversation_id.clone());
            }
            state.put(record)?;
        }
        for conversation_id in &touched {
            state.publish(conversation_id);
        }
        info!(count, conversations = touched.len(), "Bulk upsert applied");
        Ok(())
    }

    async fn delete_by_conversation(&self, conversation_id: &str) -> Result<u64, StorageError> {
        let mut state = self.state.write().await;
        let removed = state
            .conversations
            .remove(conversation_id)
            .map(|c| c.records.len() as u64)
            .unwrap_or(0);
        state.publish(conversation_id);
        info!(conversation_id = %conversation_id, removed, "Conversation cleared");
        Ok(removed)
    }

    async fn update_status(
        &self,
        conversation_id: &str,
        id: &str,
        status: MessageStatus,
    ) -> Result<MessageRecord, StorageError> {
        let mut state = self.state.write().await;
        let stored = state
            .conversations
            .get_mut(conversation_id)
            .and_then(|c| c.records.get_mut(id))
            .ok_or_else(|| StorageError::not_found(conversation_id, id))?;
        stored.record.status = stored
            .record
            .status
            .transition(status)
            .map_err(|e| StorageError::transition(id, e))?;
        let updated = stored.record.clone();
        state.publish(conversation_id);
        debug!(conversation_id = %conversation_id, message_id = %id, status = %status, "Status updated");
        Ok(updated)
    }

    async fn promote(
        &self,
        conversation_id: &str,
        old_id: &str,
        new_id: &str,
        status: MessageStatus,
    ) -> Result<MessageRecord, StorageError> {
        let mut state = self.state.write().await;
        let conversation = state
            .conversations
            .get_mut(conversation_id)
            .ok_or_else(|| StorageError::not_found(conversation_id, old_id))?;
        let current = conversation
            .records
            .get(old_id)
            .ok_or_else(|| StorageError::not_found(conversation_id, old_id))?;
        let next = current
            .record
            .status
            .transition(status)
            .map_err(|e| StorageError::transition(old_id, e))?;

        let mut stored = conversation
            .records
            .remove(old_id)
            .ok_or_else(|| StorageError::not_found(conversation_id, old_id))?;
        stored.record.id = new_id.to_string();
        stored.record.status = next;
        let replaced = conversation.records.insert(new_id.to_string(), stored.clone());
        let promoted = stored.record;
        state.publish(conversation_id);

        info!(
            conversation_id = %conversation_id,
            old_id = %old_id,
            new_id = %new_id,
            replaced_existing = replaced.is_some(),
            "Record promoted"
        );
        Ok(promoted)
    }

    async fn replace_confirmed(
        &self,
        conversation_id: &str,
        records: Vec<MessageRecord>,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        let pending_collision = records.iter().find(|r| {
            state
                .find(conversation_id, &r.id)
                .is_some_and(|s| s.record.status == MessageStatus::Failed)
        });
        if let Some(record) = pending_collision {
            return Err(StorageError::InvalidTransition {
                id: record.id.clone(),
                from: MessageStatus::Failed,
                to: record.status,
            });
        }
        let mut kept = 0usize;
        if let Some(conversation) = state.conversations.get_mut(conversation_id) {
            conversation
                .records
                .retain(|_, s| s.record.status != MessageStatus::Sent);
            kept = conversation.records.len();
        }
        let fetched = records.len();
        for record in records {
            state.put(record)?;
        }
        state.publish(conversation_id);
        info!(
            conversation_id = %conversation_id,
            fetched,
            kept_pending = kept,
            "Confirmed records replaced"
        );
        Ok(())
    }

    async fn get(
        &self,
        conversation_id: &str,
        id: &str,
    ) -> Result<Option<MessageRecord>, StorageError> {
        let state = self.state.read().await;
        Ok(state.find(conversation_id, id).map(|s| s.record.clone()))
    }

    async fn snapshot_by_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<MessageRecord>, StorageError> {
        let state = self.state.read().await;
        Ok(state.snapshot(conversation_id))
    }

    async fn observe_by_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<SnapshotStream, StorageError> {
        let mut state = self.state.write().await;
        let current = state.snapshot(conversation_id);
        Ok(state.hub.subscribe(conversation_id, current))
    }
}
