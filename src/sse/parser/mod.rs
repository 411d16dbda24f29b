//! SSE stream framing logic
//!
//! Contains the stateful [`FrameAssembler`] that turns arbitrarily sliced text
//! into complete event blocks, plus the line and block parsing functions it
//! is built on. Payload decoding lives in the `payload` and `legacy`
//! submodules.

mod legacy;
mod payload;

use crate::sse::events::{Block, SseFrame, SseLine};

pub use legacy::{parse_legacy, LegacyParseError, LegacyValue};
pub use payload::parse_payload;

/// Event block separator after CRLF normalization.
const BOUNDARY: &str = "\n\n";

const KEEP_ALIVE: &str = "keep-alive";
const COMMENT_KEEP_ALIVE: &str = "comment: keep-alive";

/// Whether a single line is a keep-alive marker.
///
/// Accepts `:keep-alive`, `: keep-alive` and the `comment: keep-alive` form,
/// each after optional leading whitespace.
pub fn is_keep_alive_line(line: &str) -> bool {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix(':') {
        return rest.trim_start().starts_with(KEEP_ALIVE);
    }
    line.starts_with(COMMENT_KEEP_ALIVE)
}

/// Whether an unterminated line could still become a keep-alive marker.
fn may_become_keep_alive(partial: &str) -> bool {
    let line = partial.trim_start().trim_end_matches('\r');
    if let Some(rest) = line.strip_prefix(':') {
        let rest = rest.trim_start();
        return KEEP_ALIVE.starts_with(rest) || rest.starts_with(KEEP_ALIVE);
    }
    COMMENT_KEEP_ALIVE.starts_with(line) || line.starts_with(COMMENT_KEEP_ALIVE)
}

/// Whether a line carries anything besides whitespace and keep-alive markers.
///
/// An unterminated line only counts once it can no longer turn into a
/// marker, so `": keep"` followed by `"-alive"` never counts.
fn is_content_line(line: &str, terminated: bool) -> bool {
    if line.trim().is_empty() {
        return false;
    }
    if terminated {
        !is_keep_alive_line(line)
    } else {
        !may_become_keep_alive(line)
    }
}

/// Parse a single SSE line into its component type
pub fn parse_sse_line(line: &str) -> SseLine {
    let line = line.trim();
    if line.is_empty() {
        return SseLine::Empty;
    }

    if let Some(stripped) = line.strip_prefix(':') {
        return SseLine::Comment(stripped.trim().to_string());
    }

    let (field, value) = match line.split_once(':') {
        Some((field, value)) => (field.trim(), value.trim()),
        None => (line, ""),
    };

    match field {
        "data" => SseLine::Data(value.to_string()),
        "event" => SseLine::Event(value.to_string()),
        "id" => SseLine::Id(value.to_string()),
        "retry" => SseLine::Retry(value.parse().ok()),
        // Unknown field - treat as comment
        _ => SseLine::Comment(line.to_string()),
    }
}

/// Parse one raw block (the text between two boundaries).
///
/// Multiple `data:` lines are concatenated in order.
pub fn parse_block(block: &str) -> Block {
    let mut frame = SseFrame::default();
    let mut saw_line = false;
    let mut keep_alive_only = true;

    for line in block.split('\n') {
        let parsed = parse_sse_line(line);
        if parsed == SseLine::Empty {
            continue;
        }
        saw_line = true;
        if !is_keep_alive_line(line) {
            keep_alive_only = false;
        }

        match parsed {
            SseLine::Data(data) => frame
                .data
                .get_or_insert_with(String::new)
                .push_str(&data),
            SseLine::Event(event) => frame.event = Some(event),
            SseLine::Id(id) => frame.id = Some(id),
            SseLine::Retry(Some(ms)) => frame.retry = Some(ms),
            SseLine::Retry(None) | SseLine::Comment(_) | SseLine::Empty => {}
        }
    }

    if frame.has_fields() {
        Block::Frame(frame)
    } else if saw_line && keep_alive_only {
        Block::Heartbeat
    } else {
        Block::Ignored
    }
}

/// What one [`FrameAssembler::push`] produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pushed {
    /// Frames the text completed, in arrival order
    pub frames: Vec<SseFrame>,
    /// The text added something besides whitespace and keep-alive markers
    pub has_content: bool,
    /// The text left part of an event waiting for its boundary
    pub pending: bool,
}

/// Rolling buffer that splits decoded text into complete event frames.
///
/// Frames come out in arrival order and are identical no matter where the
/// transport sliced the underlying stream.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    /// Text not yet terminated by a boundary
    buffer: String,
    /// Most recent `id:` value
    last_event_id: Option<String>,
    /// Most recent `retry:` value
    retry_ms: Option<u64>,
    /// Keep-alive blocks discarded so far
    heartbeats: usize,
}

impl FrameAssembler {
    /// Create a new assembler
    pub fn new() -> Self {
        Self::default()
    }

    /// Append decoded text and return every frame it completes.
    pub fn push(&mut self, text: &str) -> Pushed {
        // Start of the line the new text extends
        let line_start = self.buffer.rfind('\n').map_or(0, |i| i + 1);
        self.append_normalized(text);
        let has_content = !text.trim().is_empty() && self.has_content_from(line_start);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.find(BOUNDARY) {
            let block: String = self.buffer.drain(..pos + BOUNDARY.len()).collect();
            if let Some(frame) = self.accept(&block[..pos]) {
                frames.push(frame);
            }
        }

        Pushed {
            frames,
            has_content,
            pending: has_content && self.has_content_from(0),
        }
    }

    /// Drain the buffer at connection close.
    ///
    /// The remainder is parsed only if its last line was terminated; an
    /// unterminated tail is dropped rather than guessed at.
    pub fn flush(&mut self) -> Option<SseFrame> {
        let tail = std::mem::take(&mut self.buffer);
        if tail.trim().is_empty() {
            return None;
        }
        if !tail.ends_with(|c| c == '\n' || c == '\r') {
            tracing::debug!(bytes = tail.len(), "Dropping unterminated tail at close");
            return None;
        }
        self.accept(&tail)
    }

    /// Discard buffered text.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Text waiting for a boundary.
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    pub fn retry_ms(&self) -> Option<u64> {
        self.retry_ms
    }

    pub fn heartbeats(&self) -> usize {
        self.heartbeats
    }

    fn has_content_from(&self, start: usize) -> bool {
        let mut lines = self.buffer[start..].split('\n').peekable();
        while let Some(line) = lines.next() {
            if is_content_line(line, lines.peek().is_some()) {
                return true;
            }
        }
        false
    }

    fn append_normalized(&mut self, text: &str) {
        // A CRLF pair may be split across two fragments
        let text = if self.buffer.ends_with('\r') && text.starts_with('\n') {
            self.buffer.pop();
            text
        } else {
            text
        };
        if text.contains('\r') {
            self.buffer.push_str(&text.replace("\r\n", "\n"));
        } else {
            self.buffer.push_str(text);
        }
    }

    fn accept(&mut self, block: &str) -> Option<SseFrame> {
        match parse_block(block) {
            Block::Frame(frame) => {
                if let Some(id) = &frame.id {
                    self.last_event_id = Some(id.clone());
                }
                if frame.retry.is_some() {
                    self.retry_ms = frame.retry;
                }
                Some(frame)
            }
            Block::Heartbeat => {
                self.heartbeats += 1;
                tracing::trace!("Discarding keep-alive block");
                None
            }
            Block::Ignored => {
                tracing::trace!("Discarding block without recognized fields");
                None
            }
        }
    }
}
