// src/stream/frame.rs
// Parses individual SSE lines from the inference gateway.

use serde::Deserialize;

/// Prefix marking a data frame in the event stream.
const DATA_PREFIX: &str = "data: ";

/// Sentinel payload signaling normal end of stream.
const DONE_SENTINEL: &str = "[DONE]";

/// One parsed chunk of a streaming chat-completion response.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamChoice {
    pub delta: Option<StreamDelta>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamDelta {
    pub content: Option<String>,
}

/// Outcome of parsing one complete line.
#[derive(Debug)]
pub enum SseFrame {
    /// A `data:` frame carrying a parsed chunk.
    Chunk(StreamChunk),
    /// The `[DONE]` termination sentinel.
    Done,
    /// Keep-alive, comment, or blank line. Not an error.
    Ignored,
    /// A `data:` frame whose payload failed to parse as JSON.
    Malformed,
}

/// Parse one complete line from the stream.
///
/// Lines without the `data: ` prefix are keep-alives or comments and are
/// ignored. Malformed payloads are reported as such so the decoder can
/// count them; they never abort the stream.
pub fn parse_line(line: &str) -> SseFrame {
    let line = line.trim();

    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return SseFrame::Ignored;
    };
    let payload = payload.trim();

    if payload == DONE_SENTINEL {
        return SseFrame::Done;
    }

    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => SseFrame::Chunk(chunk),
        Err(_) => SseFrame::Malformed,
    }
}

impl StreamChunk {
    /// Incremental text from the first choice, if any.
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.as_ref())
            .and_then(|delta| delta.content.as_deref())
    }
}
