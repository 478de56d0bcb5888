//! Per-conversation read/write gates between sends and refreshes.
//!
//! A gate exists only while someone holds a [`GateLease`] on it; the last lease to drop removes
//! the map entry, so the map tracks only conversations with work in flight.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;

type GateMap = DashMap<String, Arc<RwLock<()>>>;

#[derive(Debug, Default, Clone)]
pub(crate) struct ConversationGates {
    gates: Arc<GateMap>,
}

impl ConversationGates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a lease on the conversation's gate, creating it if needed.
    pub fn lease(&self, conversation_id: &str) -> GateLease {
        let gate = self
            .gates
            .entry(conversation_id.to_string())
            .or_default()
            .clone();
        GateLease {
            gates: Arc::clone(&self.gates),
            key: conversation_id.to_string(),
            gate,
        }
    }

    /// Conversations that currently have a gate.
    pub fn len(&self) -> usize {
        self.gates.len()
    }
}

pub(crate) struct GateLease {
    gates: Arc<GateMap>,
    key: String,
    gate: Arc<RwLock<()>>,
}

impl GateLease {
    pub fn gate(&self) -> &RwLock<()> {
        &self.gate
    }
}

impl Drop for GateLease {
    fn drop(&mut self) {
        // Two references left means the map and this lease. The shard lock is held across the
        // check, so a concurrent `lease` either bumps the count first or creates a fresh gate.
        self.gates
            .remove_if(&self.key, |_, gate| Arc::strong_count(gate) == 2);
    }
}
