//! # chat-core
//!
//! Shared model for the chat sync engine: [`MessageRecord`] and its [`MessageStatus`] lifecycle,
//! [`Author`] identity (including the reserved AI sender), the remote DTOs exchanged with the chat
//! service, and tracing initialization. Transport- and storage-agnostic; used by every other crate.

pub mod logger;
pub mod status;
pub mod types;


pub use logger::init_tracing;
pub use status::{MessageStatus, TransitionError};
pub use types::{
    is_local_id, new_local_id, AnalysisResponse, Author, MessageRecord, PlaceSuggestion,
    RemoteMessage, AI_SENDER_ID, AI_SENDER_NAME, LOCAL_ID_PREFIX,
};
