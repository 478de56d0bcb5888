//! Shared test helpers: a scriptable [`RemoteChatService`] fake and stream utilities.
//!
//! Network calls can be held open with a gate (a zero-permit semaphore). Each call signals
//! `*_entered` when it starts, so a test can act while the call is in flight and then release it.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chat_core::{AnalysisResponse, Author, MessageRecord, PlaceSuggestion, RemoteMessage};
use chrono::{TimeZone, Utc};
use remote_client::{NetworkError, RemoteChatService};
use storage::{ConversationSnapshot, MessageCache, SnapshotStream};
use tokio::sync::{Notify, Semaphore};
use tokio_stream::StreamExt;

/// Holds a remote call open until released.
#[derive(Clone)]
pub struct Gate {
    entered: Arc<Notify>,
    permits: Arc<Semaphore>,
}

impl Gate {
    pub fn new() -> Self {
        Self {
            entered: Arc::new(Notify::new()),
            permits: Arc::new(Semaphore::new(0)),
        }
    }

    /// Waits until a gated call has started.
    pub async fn wait_entered(&self) {
        tokio::time::timeout(Duration::from_secs(2), self.entered.notified())
            .await
            .expect("gated call started");
    }

    /// Lets one gated call proceed.
    pub fn release(&self) {
        self.permits.add_permits(1);
    }

    async fn pass(&self) {
        self.entered.notify_one();
        let permit = self.permits.acquire().await.expect("gate open");
        permit.forget();
    }
}

#[derive(Default)]
pub struct FakeRemote {
    pub history: Mutex<Vec<RemoteMessage>>,
    pub fetch_error: Mutex<Option<NetworkError>>,
    /// Scripted outcomes for successive sends; `Ok(id)` is the server id to assign.
    pub send_outcomes: Mutex<VecDeque<Result<String, NetworkError>>>,
    pub analysis: Mutex<Option<Result<AnalysisResponse, NetworkError>>>,
    pub send_gate: Option<Gate>,
    pub fetch_gate: Option<Gate>,
    pub analyze_gate: Option<Gate>,
    pub send_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub analyze_calls: AtomicUsize,
    /// Histories received by `analyze`, in call order.
    pub analyzed_histories: Mutex<Vec<Vec<MessageRecord>>>,
    /// Messages accepted by `send_message`, as the server would report them.
    pub sent: Mutex<Vec<RemoteMessage>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_send_gate(mut self, gate: Gate) -> Self {
        self.send_gate = Some(gate);
        self
    }

    pub fn with_fetch_gate(mut self, gate: Gate) -> Self {
        self.fetch_gate = Some(gate);
        self
    }

    pub fn with_analyze_gate(mut self, gate: Gate) -> Self {
        self.analyze_gate = Some(gate);
        self
    }

    pub fn script_send(&self, outcome: Result<&str, NetworkError>) {
        self.send_outcomes
            .lock()
            .unwrap()
            .push_back(outcome.map(str::to_string));
    }

    pub fn set_history(&self, history: Vec<RemoteMessage>) {
        *self.history.lock().unwrap() = history;
    }

    pub fn set_analysis(&self, outcome: Result<AnalysisResponse, NetworkError>) {
        *self.analysis.lock().unwrap() = Some(outcome);
    }
}

#[async_trait]
impl RemoteChatService for FakeRemote {
    async fn fetch_history(&self, _conversation_id: &str) -> Result<Vec<RemoteMessage>, NetworkError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.fetch_gate {
            gate.pass().await;
        }
        if let Some(err) = self.fetch_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.history.lock().unwrap().clone())
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<RemoteMessage, NetworkError> {
        let n = self.send_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(gate) = &self.send_gate {
            gate.pass().await;
        }
        let outcome = self
            .send_outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("srv-{}", n)));
        let id = outcome?;
        let message = remote_message(conversation_id, &id, "u1", text, n as i64);
        self.sent.lock().unwrap().push(message.clone());
        Ok(message)
    }

    async fn analyze(
        &self,
        _conversation_id: &str,
        history: &[MessageRecord],
    ) -> Result<AnalysisResponse, NetworkError> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        self.analyzed_histories.lock().unwrap().push(history.to_vec());
        if let Some(gate) = &self.analyze_gate {
            gate.pass().await;
        }
        self.analysis
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| {
                Ok(AnalysisResponse {
                    text: "Here are some ideas".to_string(),
                    suggestions: vec![PlaceSuggestion::new("p1", "Old Town")],
                })
            })
    }
}

pub fn author() -> Author {
    Author::new("u1", "Alice")
}

/// A server-side message with a timestamp `secs` seconds after a fixed epoch.
pub fn remote_message(conversation_id: &str, id: &str, sender: &str, text: &str, secs: i64) -> RemoteMessage {
    RemoteMessage {
        id: id.to_string(),
        conversation_id: conversation_id.to_string(),
        sender_id: sender.to_string(),
        sender_name: sender.to_uppercase(),
        text: text.to_string(),
        timestamp: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        is_ai_authored: false,
        suggestions: Vec::new(),
    }
}

pub async fn next_snapshot(stream: &mut SnapshotStream) -> ConversationSnapshot {
    tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("snapshot within timeout")
        .expect("stream open")
}

/// Drains every snapshot already queued on the stream without waiting for new ones.
pub async fn drain(stream: &mut SnapshotStream) -> Vec<ConversationSnapshot> {
    let mut out = Vec::new();
    while let Ok(Some(snapshot)) =
        tokio::time::timeout(Duration::from_millis(50), stream.next()).await
    {
        out.push(snapshot);
    }
    out
}

pub fn ids(records: &[MessageRecord]) -> Vec<&str> {
    records.iter().map(|r| r.id.as_str()).collect()
}

/// Polls the cache until `done` holds for the conversation, then returns that snapshot.
pub async fn wait_for<F>(cache: &dyn MessageCache, conversation_id: &str, done: F) -> Vec<MessageRecord>
where
    F: Fn(&[MessageRecord]) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let snapshot = cache.snapshot_by_conversation(conversation_id).await.unwrap();
            if done(&snapshot) {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition reached within timeout")
}
