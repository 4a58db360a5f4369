// src/stream/mod.rs
// Incremental decoder for the gateway's SSE chat-completion stream.
//
// The pipeline is: bytes -> lines (LineBuffer) -> frames (parse_line)
// -> fragments (DeltaAccumulator). Chunks are processed strictly in
// arrival order on one task; the decoded text is chunk-boundary
// independent.

mod accumulator;
mod frame;
mod line_buffer;

pub use accumulator::DeltaAccumulator;
pub use frame::{parse_line, SseFrame, StreamChoice, StreamChunk, StreamDelta};
pub use line_buffer::LineBuffer;

use tracing::{debug, warn};

/// Result of decoding a complete stream.
#[derive(Debug)]
pub struct DecodedMessage {
    /// Arrival-order concatenation of every non-empty fragment.
    pub text: String,
    /// Whether the `[DONE]` sentinel was observed before the socket closed.
    pub saw_done: bool,
    /// Count of `data:` frames whose payload failed to parse.
    pub frames_skipped: u64,
}

/// Stateful decoder that turns raw transport chunks into text fragments.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    /// Bytes held back because they end mid-character.
    pending: Vec<u8>,
    lines: LineBuffer,
    accumulator: DeltaAccumulator,
    saw_done: bool,
    frames_skipped: u64,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk; returns the fragments it completed,
    /// in arrival order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        // Transport chunks can split a multi-byte character; hold the
        // incomplete trailing sequence back until the next chunk completes
        // it. Genuinely invalid bytes mid-buffer decode lossily.
        let boundary = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => self.pending.len(),
        };

        let rest = self.pending.split_off(boundary);
        let ready = std::mem::replace(&mut self.pending, rest);
        let text = String::from_utf8_lossy(&ready);

        let mut fragments = Vec::new();
        for line in self.lines.push(&text) {
            if let Some(fragment) = self.process_line(&line) {
                fragments.push(fragment);
            }
        }
        fragments
    }

    /// End of transport. Flush-parses any unterminated trailing line, then
    /// yields the assembled message.
    pub fn finish(mut self) -> DecodedMessage {
        // A stream cut off mid-character decodes lossily rather than
        // dropping the tail bytes.
        if !self.pending.is_empty() {
            let tail = String::from_utf8_lossy(&self.pending).into_owned();
            self.pending.clear();
            for line in self.lines.push(&tail) {
                self.process_line(&line);
            }
        }
        if let Some(tail) = self.lines.finish() {
            debug!(len = tail.len(), "flush-parsing unterminated final line");
            self.process_line(&tail);
        }
        if self.frames_skipped > 0 {
            warn!(
                skipped = self.frames_skipped,
                "stream contained malformed data frames"
            );
        }
        DecodedMessage {
            text: self.accumulator.into_text(),
            saw_done: self.saw_done,
            frames_skipped: self.frames_skipped,
        }
    }

    /// Text accumulated so far (the live placeholder content).
    pub fn text(&self) -> &str {
        self.accumulator.text()
    }

    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped
    }

    pub fn saw_done(&self) -> bool {
        self.saw_done
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        match parse_line(line) {
            SseFrame::Chunk(chunk) => self.accumulator.apply(&chunk),
            SseFrame::Done => {
                self.saw_done = true;
                None
            }
            SseFrame::Ignored => None,
            SseFrame::Malformed => {
                self.frames_skipped += 1;
                warn!(line, "skipping malformed stream frame");
                None
            }
        }
    }
}
