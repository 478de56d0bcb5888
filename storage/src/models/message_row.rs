//! Message row model for persistence.
//!
//! Maps to the `messages` table used by SqliteMessageCache. Timestamps are stored as epoch
//! milliseconds and suggestions as a JSON array.

use chat_core::{MessageRecord, MessageStatus, PlaceSuggestion};
use chrono::{TimeZone, Utc};

use crate::error::StorageError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub text: String,
    pub timestamp_ms: i64,
    pub is_ai_authored: bool,
    pub suggestions: String,
    pub status: String,
}

impl MessageRow {
    pub fn from_record(record: &MessageRecord) -> Result<Self, StorageError> {
        Ok(Self {
            id: record.id.clone(),
            conversation_id: record.conversation_id.clone(),
            sender_id: record.sender_id.clone(),
            sender_name: record.sender_name.clone(),
            text: record.text.clone(),
            timestamp_ms: record.timestamp.timestamp_millis(),
            is_ai_authored: record.is_ai_authored,
            suggestions: serde_json::to_string(&record.suggestions)?,
            status: record.status.as_str().to_string(),
        })
    }

    pub fn into_record(self) -> Result<MessageRecord, StorageError> {
        let timestamp = Utc
            .timestamp_millis_opt(self.timestamp_ms)
            .single()
            .ok_or_else(|| {
                StorageError::Serialization(format!("invalid timestamp {}", self.timestamp_ms))
            })?;
        let status: MessageStatus = self.status.parse().map_err(StorageError::Serialization)?;
        let suggestions: Vec<PlaceSuggestion> = serde_json::from_str(&self.suggestions)?;
        Ok(MessageRecord {
            id: self.id,
            conversation_id: self.conversation_id,
            sender_id: self.sender_id,
            sender_name: self.sender_name,
            text: self.text,
            timestamp,
            is_ai_authored: self.is_ai_authored,
            suggestions,
            status,
        })
    }
}
