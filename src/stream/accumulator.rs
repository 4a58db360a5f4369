// src/stream/accumulator.rs
// Folds incremental text fragments into the running assistant message.

use super::frame::StreamChunk;

/// Concatenates delta fragments in strict arrival order.
///
/// Never reorders, drops, or deduplicates: the settled message is exactly
/// the concatenation of every non-empty fragment that arrived.
#[derive(Debug, Default)]
pub struct DeltaAccumulator {
    buffer: String,
    fragments: u64,
}

impl DeltaAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one parsed chunk. Returns the appended fragment when the chunk
    /// carried non-empty content, so callers can live-update a placeholder.
    pub fn apply(&mut self, chunk: &StreamChunk) -> Option<String> {
        let content = chunk.content()?;
        if content.is_empty() {
            return None;
        }
        self.buffer.push_str(content);
        self.fragments += 1;
        Some(content.to_string())
    }

    /// The accumulated text so far.
    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// Number of non-empty fragments folded in.
    pub fn fragment_count(&self) -> u64 {
        self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Consume the accumulator, yielding the final message text.
    pub fn into_text(self) -> String {
        self.buffer
    }
}
