// src/error.rs
// Error taxonomy for the chat core

use thiserror::Error;

/// Errors surfaced by the chat core.
///
/// Nothing here is fatal to the process; every failure is scoped to the
/// current turn. Frame-level parse failures are deliberately absent: a
/// malformed SSE payload is skipped (and counted) by the decoder, never
/// raised as an error.
#[derive(Error, Debug)]
pub enum ChatError {
    /// Gateway returned 429. The message is shown to the user verbatim.
    #[error("{0}")]
    RateLimited(String),

    /// Gateway returned 402 (billing/quota). Shown to the user verbatim.
    #[error("{0}")]
    QuotaExceeded(String),

    /// Gateway rejected the request before streaming began.
    #[error("gateway error ({status}): {message}")]
    Gateway { status: u16, message: String },

    /// Network failure talking to the gateway, before or during the stream.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Failure writing or reading conversation state.
    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A send was attempted while a turn is still streaming.
    #[error("a response is already streaming for this conversation")]
    TurnInFlight,

    /// The turn was cancelled by the caller mid-stream.
    #[error("turn cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, ChatError>;

impl ChatError {
    /// Message suitable for direct display in a chat UI or terminal.
    pub fn user_message(&self) -> String {
        match self {
            // 429/402 bodies carry gateway-authored copy, pass it through.
            ChatError::RateLimited(msg) | ChatError::QuotaExceeded(msg) => msg.clone(),
            other => other.to_string(),
        }
    }

    /// True for errors that leave the conversation usable for a retry.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ChatError::Config(_))
    }
}
