//! # Sync engine
//!
//! Mediates between the local [`MessageCache`] and the [`RemoteChatService`]. Callers (UI,
//! view-models, the CLI) only ever use [`SyncEngine::observe`], [`send`](SyncEngine::send),
//! [`refresh`](SyncEngine::refresh) and [`analyze`](SyncEngine::analyze).
//!
//! ## Send
//!
//! 1. Optimistic `Sending` record under a fresh local id, written before any network I/O.
//! 2. Remote send; on success the record is promoted to the server id as `Sent` in one cache
//!    transition, on failure it is marked `Failed` and the error is returned as well.
//!
//! Step 2 runs on a task spawned as soon as the optimistic record exists: the record always
//! resolves to `Sent` or `Failed`, even if the caller stops waiting.
//!
//! ## Refresh vs. in-flight sends
//!
//! Each conversation has a gate. A send holds it shared from its network call until its commit; a
//! refresh holds it exclusively while fetching and replacing. A refresh therefore never sees a
//! server copy of a message whose local record has not been promoted yet, and never runs while a
//! promotion is pending. The optimistic write happens before the gate so it is never delayed, and
//! the commit task is spawned right after it, so waiting on the gate is already detached from the
//! caller.
//!
//! ## Analyze
//!
//! Single-flight per conversation: a second call while one is running returns `Ok(None)` without
//! touching the remote service. The AI record is written with one upsert after the response
//! arrives, so cancellation leaves either the whole record or nothing.

use std::sync::Arc;

use chat_core::{Author, MessageRecord, MessageStatus, RemoteMessage};
use remote_client::RemoteChatService;
use storage::{MessageCache, SnapshotStream, StorageError};
use tracing::{info, instrument, warn, Instrument, Span};

use crate::config::{EngineConfig, RefreshPolicy};
use crate::error::{Result, SyncError};
use crate::gate::ConversationGates;
use crate::single_flight::SingleFlight;

pub struct SyncEngine {
    cache: Arc<dyn MessageCache>,
    remote: Arc<dyn RemoteChatService>,
    config: EngineConfig,
    analyses: SingleFlight,
    gates: ConversationGates,
}

impl SyncEngine {
    pub fn new(cache: Arc<dyn MessageCache>, remote: Arc<dyn RemoteChatService>) -> Self {
        Self::with_config(cache, remote, EngineConfig::default())
    }

    pub fn with_config(
        cache: Arc<dyn MessageCache>,
        remote: Arc<dyn RemoteChatService>,
        config: EngineConfig,
    ) -> Self {
        info!(refresh_policy = %config.refresh_policy, "Sync engine created");
        Self {
            cache,
            remote,
            config,
            analyses: SingleFlight::new(),
            gates: ConversationGates::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Conversations with a send or refresh currently in flight.
    pub fn active_conversations(&self) -> usize {
        self.gates.len()
    }

    /// Live ordered view of a conversation: current snapshot first, then one per change.
    pub async fn observe(&self, conversation_id: &str) -> Result<SnapshotStream> {
        Ok(self.cache.observe_by_conversation(conversation_id).await?)
    }

    /// Diagnostic lookup of a single record.
    pub async fn get_message(&self, conversation_id: &str, id: &str) -> Result<MessageRecord> {
        self.cache
            .get(conversation_id, id)
            .await?
            .ok_or_else(|| {
                SyncError::NotFound(format!("message {} in conversation {}", id, conversation_id))
            })
    }

    /// Sends `text` as `author`. Returns the promoted (`Sent`) record, or the network error after
    /// the local record has been marked `Failed`.
    #[instrument(skip(self, text, author), fields(author_id = %author.id))]
    pub async fn send(
        &self,
        conversation_id: &str,
        text: &str,
        author: &Author,
    ) -> Result<MessageRecord> {
        let pending = MessageRecord::pending(conversation_id, text, author);
        let local_id = pending.id.clone();
        self.cache.upsert(pending).await?;
        info!(local_id = %local_id, "Optimistic record written");

        let commit = tokio::spawn(
            commit_send(
                Arc::clone(&self.cache),
                Arc::clone(&self.remote),
                self.gates.clone(),
                conversation_id.to_string(),
                local_id,
                text.to_string(),
            )
            .instrument(Span::current()),
        );
        commit
            .await
            .map_err(|e| SyncError::Task(e.to_string()))?
    }

    /// Replaces the conversation's confirmed history with the server's. Returns the number of
    /// records fetched. On failure the cache is left untouched.
    #[instrument(skip(self))]
    pub async fn refresh(&self, conversation_id: &str) -> Result<usize> {
        let lease = self.gates.lease(conversation_id);
        let _exclusive = lease.gate().write().await;

        let history = self.remote.fetch_history(conversation_id).await?;
        let records: Vec<MessageRecord> = history
            .into_iter()
            .map(|remote| confirmed_record(conversation_id, remote))
            .collect();
        let fetched = records.len();

        match self.config.refresh_policy {
            RefreshPolicy::PreservePending => {
                self.cache.replace_confirmed(conversation_id, records).await?;
            }
            RefreshPolicy::Overwrite => {
                self.cache.delete_by_conversation(conversation_id).await?;
                self.cache.upsert_all(records).await?;
            }
        }

        info!(fetched, policy = %self.config.refresh_policy, "Conversation refreshed");
        Ok(fetched)
    }

    /// Runs AI analysis over the current history and appends the result.
    ///
    /// Returns `Ok(None)` if an analysis for this conversation is already running.
    #[instrument(skip(self))]
    pub async fn analyze(&self, conversation_id: &str) -> Result<Option<MessageRecord>> {
        let Some(flight) = self.analyses.try_begin(conversation_id) else {
            info!("Analysis already in flight, ignoring request");
            return Ok(None);
        };

        let history = self.cache.snapshot_by_conversation(conversation_id).await?;
        info!(history_len = history.len(), "Requesting analysis");

        let response = tokio::select! {
            _ = flight.token().cancelled() => {
                info!("Analysis cancelled before a response arrived");
                return Err(SyncError::Cancelled(conversation_id.to_string()));
            }
            result = self.remote.analyze(conversation_id, &history) => result?,
        };

        let record = MessageRecord::ai(conversation_id, response.text, response.suggestions);
        self.cache.upsert(record.clone()).await?;
        info!(
            message_id = %record.id,
            suggestions = record.suggestions.len(),
            "AI record appended"
        );
        Ok(Some(record))
    }

    /// Cancels the running analysis for a conversation. Returns false if none is running.
    pub fn cancel_analyze(&self, conversation_id: &str) -> bool {
        let cancelled = self.analyses.cancel(conversation_id);
        if cancelled {
            info!(conversation_id = %conversation_id, "Analysis cancellation requested");
        }
        cancelled
    }

    pub fn is_analyzing(&self, conversation_id: &str) -> bool {
        self.analyses.is_running(conversation_id)
    }
}

fn confirmed_record(conversation_id: &str, remote: RemoteMessage) -> MessageRecord {
    let mut record = MessageRecord::from_remote(remote);
    record.conversation_id = conversation_id.to_string();
    record
}

/// Network call plus reconciliation for one send. Holds the conversation gate shared from before
/// the network call until the cache reflects the outcome.
async fn commit_send(
    cache: Arc<dyn MessageCache>,
    remote: Arc<dyn RemoteChatService>,
    gates: ConversationGates,
    conversation_id: String,
    local_id: String,
    text: String,
) -> Result<MessageRecord> {
    let lease = gates.lease(&conversation_id);
    let _shared = lease.gate().read().await;

    match remote.send_message(&conversation_id, &text).await {
        Ok(confirmed) => {
            let server_id = confirmed.id.clone();
            match cache
                .promote(&conversation_id, &local_id, &server_id, MessageStatus::Sent)
                .await
            {
                Ok(record) => {
                    info!(local_id = %local_id, server_id = %server_id, "Send confirmed");
                    Ok(record)
                }
                Err(StorageError::NotFound(_)) => {
                    warn!(
                        local_id = %local_id,
                        server_id = %server_id,
                        "Local record gone before promotion, writing confirmed record"
                    );
                    let record = confirmed_record(&conversation_id, confirmed);
                    cache.upsert(record.clone()).await?;
                    Ok(record)
                }
                Err(e) => Err(e.into()),
            }
        }
        Err(err) => {
            warn!(local_id = %local_id, error = %err, "Send failed");
            match cache
                .update_status(&conversation_id, &local_id, MessageStatus::Failed)
                .await
            {
                Ok(_) | Err(StorageError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
            Err(err.into())
        }
    }
}
