//! # Remote chat service boundary
//!
//! Defines the [`RemoteChatService`] trait the sync engine talks to, and an HTTP/JSON
//! implementation ([`HttpRemoteChatService`]). All calls are fallible with a [`NetworkError`];
//! nothing here deduplicates or retries.

use async_trait::async_trait;
use chat_core::{AnalysisResponse, MessageRecord, RemoteMessage};

mod config;
mod error;
mod http_client;

pub use config::RemoteConfig;
pub use error::NetworkError;
pub use http_client::{mask_token, HttpRemoteChatService};

/// Remote source of truth for conversations.
#[async_trait]
pub trait RemoteChatService: Send + Sync {
    /// Full message history of a conversation.
    async fn fetch_history(&self, conversation_id: &str) -> Result<Vec<RemoteMessage>, NetworkError>;

    /// Sends a message; the returned entry carries the server-assigned id and timestamp.
    async fn send_message(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<RemoteMessage, NetworkError>;

    /// Runs AI analysis over a history snapshot.
    async fn analyze(
        &self,
        conversation_id: &str,
        history: &[MessageRecord],
    ) -> Result<AnalysisResponse, NetworkError>;
}
