// src/stream/line_buffer.rs
// Accumulates transport chunks and yields complete newline-terminated lines.

/// Splits an incoming character stream into lines across chunk boundaries.
///
/// Chunks arrive at arbitrary byte offsets; whatever trails the last `\n`
/// is retained and prefixed to the next chunk. Lines come out exactly once,
/// in order.
#[derive(Debug, Default)]
pub struct LineBuffer {
    leftover: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a decoded chunk and return every line completed by it.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.leftover.push_str(chunk);

        let Some(last_newline) = self.leftover.rfind('\n') else {
            return Vec::new();
        };

        let tail = self.leftover.split_off(last_newline + 1);
        let head = std::mem::replace(&mut self.leftover, tail);

        // head is newline-terminated; drop the final '\n' before splitting
        // so we don't emit a phantom trailing line.
        head[..head.len() - 1]
            .split('\n')
            .map(str::to_string)
            .collect()
    }

    /// End of stream: take any unterminated trailing line.
    ///
    /// The gateway is expected to terminate every frame with `\n`, but that
    /// is not guaranteed by the transport. Callers flush-parse this rather
    /// than dropping a final frame on the floor.
    pub fn finish(&mut self) -> Option<String> {
        if self.leftover.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.leftover))
        }
    }

    /// Current unterminated tail, if any.
    pub fn leftover(&self) -> &str {
        &self.leftover
    }
}
