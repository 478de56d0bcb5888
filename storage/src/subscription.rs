//! Per-conversation subscriber registry.
//!
//! Each subscriber owns an unbounded channel, so every published snapshot reaches every live
//! subscriber in publish order. Dropping the stream closes the channel; the sender is pruned on the
//! next publish for that conversation. The hub lives under the same lock as the cache data, which
//! makes "current snapshot on subscribe" and "snapshot per mutation" one consistent sequence.

use std::collections::HashMap;
use std::sync::Arc;

use chat_core::MessageRecord;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

/// Immutable ordered view of one conversation.
pub type ConversationSnapshot = Arc<Vec<MessageRecord>>;

/// Stream of snapshots returned by `observe_by_conversation`.
pub type SnapshotStream = UnboundedReceiverStream<ConversationSnapshot>;

type SnapshotSender = mpsc::UnboundedSender<ConversationSnapshot>;

#[derive(Debug, Default)]
pub struct SubscriberHub {
    subscribers: HashMap<String, Vec<SnapshotSender>>,
}

impl SubscriberHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber and queues `current` as its first item.
    pub fn subscribe(&mut self, conversation_id: &str, current: Vec<MessageRecord>) -> SnapshotStream {
        let (tx, rx) = mpsc::unbounded_channel();
        // Receiver is alive here, send cannot fail.
        let _ = tx.send(Arc::new(current));
        self.subscribers
            .entry(conversation_id.to_string())
            .or_default()
            .push(tx);
        debug!(conversation_id = %conversation_id, "Subscriber registered");
        UnboundedReceiverStream::new(rx)
    }

    /// True if anyone is (or may still be) listening on the conversation.
    pub fn has_subscribers(&self, conversation_id: &str) -> bool {
        self.subscribers
            .get(conversation_id)
            .is_some_and(|senders| senders.iter().any(|tx| !tx.is_closed()))
    }

    /// Number of live subscribers; prunes cancelled ones.
    pub fn subscriber_count(&mut self, conversation_id: &str) -> usize {
        let Some(senders) = self.subscribers.get_mut(conversation_id) else {
            return 0;
        };
        senders.retain(|tx| !tx.is_closed());
        let count = senders.len();
        if count == 0 {
            self.subscribers.remove(conversation_id);
        }
        count
    }

    /// Pushes `snapshot` to every live subscriber of the conversation.
    pub fn publish(&mut self, conversation_id: &str, snapshot: Vec<MessageRecord>) {
        let Some(senders) = self.subscribers.get_mut(conversation_id) else {
            return;
        };
        let snapshot = Arc::new(snapshot);
        senders.retain(|tx| tx.send(snapshot.clone()).is_ok());
        debug!(
            conversation_id = %conversation_id,
            subscribers = senders.len(),
            records = snapshot.len(),
            "Snapshot published"
        );
        if senders.is_empty() {
            self.subscribers.remove(conversation_id);
        }
    }
}
