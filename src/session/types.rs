// src/session/types.rs
// Persisted chat types and the turn state machine.

use serde::{Deserialize, Serialize};

use crate::persona::Assistant;

/// A persisted thread of messages between a user and one persona.
///
/// Created lazily on the first send of a session. Only the title is ever
/// mutated afterwards; deletion is handled outside this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub assistant_type: Assistant,
    pub title: String,
    pub created_at: i64,
}

/// One message in a conversation. Immutable once settled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub conversation_id: String,
    pub role: String,
    pub content: String,
    pub created_at: i64,
}

pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

/// Lifecycle of a conversation turn.
///
/// Idle -> Creating -> Active -> Streaming -> Settled -> Active for the
/// next turn. Creating and Settled are transient; a failed create falls
/// back to Idle so the user can resubmit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// No conversation exists yet.
    Idle,
    /// Conversation-create request in flight.
    Creating,
    /// Conversation id known, no turn in flight.
    Active,
    /// Assistant response streaming; sends are rejected.
    Streaming,
    /// Assistant message persisted; immediately advances to Active.
    Settled,
}

/// Events emitted while a turn runs, for live UI updates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum TurnEvent {
    /// The conversation record was created (first turn only).
    #[serde(rename = "conversation_created")]
    ConversationCreated { conversation: Conversation },

    /// Incremental assistant text; append to the placeholder message.
    #[serde(rename = "text_delta")]
    TextDelta { delta: String },

    /// Turn settled. `message` is None when the stream produced no content
    /// and nothing was persisted.
    #[serde(rename = "done")]
    Done { message: Option<ChatMessage> },

    /// Durable history re-read after a persistence failure, so displayed
    /// state can be reconciled with storage.
    #[serde(rename = "reconciled")]
    Reconciled { messages: Vec<ChatMessage> },

    /// Turn aborted; the placeholder should be discarded.
    #[serde(rename = "error")]
    Error { message: String },
}
