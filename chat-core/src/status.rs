//! Message lifecycle status and its transition table.
//!
//! Allowed transitions: `Sending -> Sent`, `Sending -> Failed`. `Sent` and `Failed` are terminal.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle status of a message record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    /// Optimistically written, waiting for the server.
    Sending,
    /// Confirmed by the server (or produced by analysis).
    Sent,
    /// The send call failed; kept visible so the UI can offer a retry.
    Failed,
}

/// Rejected status change.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid status transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: MessageStatus,
    pub to: MessageStatus,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sending => "SENDING",
            MessageStatus::Sent => "SENT",
            MessageStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, MessageStatus::Sending)
    }

    /// True when `self -> next` is in the transition table.
    pub fn can_transition_to(&self, next: MessageStatus) -> bool {
        matches!(
            (self, next),
            (MessageStatus::Sending, MessageStatus::Sent)
                | (MessageStatus::Sending, MessageStatus::Failed)
        )
    }

    /// Returns `next` if the transition is allowed, otherwise a [`TransitionError`].
    pub fn transition(self, next: MessageStatus) -> Result<MessageStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SENDING" => Ok(MessageStatus::Sending),
            "SENT" => Ok(MessageStatus::Sent),
            "FAILED" => Ok(MessageStatus::Failed),
            other => Err(format!("unknown message status: {}", other)),
        }
    }
}
