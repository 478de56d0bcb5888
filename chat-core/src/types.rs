//! Core types: message record, author identity, place suggestions, and remote DTOs.
//!
//! A [`MessageRecord`] is owned by the local cache; everything outside the cache works on clones.
//! Its id lives in one of two namespaces: local ids (prefixed with [`LOCAL_ID_PREFIX`], generated
//! before the server confirms a send) and server ids (assigned by the remote chat service).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::status::MessageStatus;

/// Reserved sender id for AI-authored records.
pub const AI_SENDER_ID: &str = "ai-assistant";
/// Display name attached to AI-authored records.
pub const AI_SENDER_NAME: &str = "Trip Assistant";
/// Prefix of client-generated ids; server ids never carry it.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Generates a fresh local id (random 128-bit UUID).
pub fn new_local_id() -> String {
    format!("{}{}", LOCAL_ID_PREFIX, Uuid::new_v4())
}

/// True if `id` was generated client-side by [`new_local_id`].
pub fn is_local_id(id: &str) -> bool {
    id.starts_with(LOCAL_ID_PREFIX)
}

/// Who is writing a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
}

impl Author {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// The reserved AI identity.
    pub fn ai() -> Self {
        Self::new(AI_SENDER_ID, AI_SENDER_NAME)
    }

    pub fn is_ai(&self) -> bool {
        self.id == AI_SENDER_ID
    }
}

/// A place reference attached to an AI-authored message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceSuggestion {
    pub place_id: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl PlaceSuggestion {
    pub fn new(place_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            place_id: place_id.into(),
            name: name.into(),
            address: None,
            latitude: None,
            longitude: None,
        }
    }
}

/// A single chat message as stored in the local cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub text: String,
    /// Client clock for local-origin messages, server-reported after refresh.
    pub timestamp: DateTime<Utc>,
    pub is_ai_authored: bool,
    #[serde(default)]
    pub suggestions: Vec<PlaceSuggestion>,
    pub status: MessageStatus,
}

impl MessageRecord {
    /// Creates the optimistic record written by `send`: fresh local id, `Sending`, current time.
    pub fn pending(conversation_id: impl Into<String>, text: impl Into<String>, author: &Author) -> Self {
        Self {
            id: new_local_id(),
            conversation_id: conversation_id.into(),
            sender_id: author.id.clone(),
            sender_name: author.name.clone(),
            text: text.into(),
            timestamp: Utc::now(),
            is_ai_authored: false,
            suggestions: Vec::new(),
            status: MessageStatus::Sending,
        }
    }

    /// Creates an AI-authored record. AI records are never optimistic, so they start as `Sent`.
    pub fn ai(
        conversation_id: impl Into<String>,
        text: impl Into<String>,
        suggestions: Vec<PlaceSuggestion>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            sender_id: AI_SENDER_ID.to_string(),
            sender_name: AI_SENDER_NAME.to_string(),
            text: text.into(),
            timestamp: Utc::now(),
            is_ai_authored: true,
            suggestions,
            status: MessageStatus::Sent,
        }
    }

    /// Maps a server entry into a confirmed record.
    pub fn from_remote(remote: RemoteMessage) -> Self {
        let is_ai_authored = remote.is_ai_authored || remote.sender_id == AI_SENDER_ID;
        Self {
            id: remote.id,
            conversation_id: remote.conversation_id,
            sender_id: remote.sender_id,
            sender_name: remote.sender_name,
            text: remote.text,
            timestamp: remote.timestamp,
            is_ai_authored,
            suggestions: remote.suggestions,
            status: MessageStatus::Sent,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == MessageStatus::Sending
    }

    pub fn has_local_id(&self) -> bool {
        is_local_id(&self.id)
    }
}

/// A message as reported by the remote chat service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMessage {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_ai_authored: bool,
    #[serde(default)]
    pub suggestions: Vec<PlaceSuggestion>,
}

/// Result of an analysis request: generated text plus ordered place suggestions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub text: String,
    #[serde(default)]
    pub suggestions: Vec<PlaceSuggestion>,
}
