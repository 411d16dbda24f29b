//! SSE framing types.
//!
//! Contains the line-level and block-level representations produced by the
//! frame assembler, and the errors raised while turning a frame's `data`
//! field into an answer record.

/// Represents a parsed SSE line
#[derive(Debug, Clone, PartialEq)]
pub enum SseLine {
    /// Event type declaration (e.g., "event: message")
    Event(String),
    /// Data payload (e.g., "data: {\"answer\": \"hello\"}")
    Data(String),
    /// Last event id
    Id(String),
    /// Reconnection delay in milliseconds; `None` when the value was not a number
    Retry(Option<u64>),
    /// Empty line - signals end of event
    Empty,
    /// Comment line (starts with ':') or an unrecognized field
    Comment(String),
}

/// One complete event block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SseFrame {
    /// Declared event type
    pub event: Option<String>,
    /// Concatenated data lines
    pub data: Option<String>,
    /// Event id
    pub id: Option<String>,
    /// Retry hint in milliseconds
    pub retry: Option<u64>,
}

impl SseFrame {
    /// Whether any recognized field was present.
    pub fn has_fields(&self) -> bool {
        self.event.is_some() || self.data.is_some() || self.id.is_some() || self.retry.is_some()
    }
}

/// What the assembler made of one raw block.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// A block with at least one recognized field
    Frame(SseFrame),
    /// A block made only of keep-alive comments
    Heartbeat,
    /// A block with no recognized field
    Ignored,
}

/// Errors that can occur while parsing an event payload
#[derive(Debug, Clone, PartialEq)]
pub enum SseParseError {
    /// Payload was neither JSON nor the legacy bracketed notation
    InvalidJson { source: String, preview: String },
    /// Payload looked like the legacy notation but did not parse
    InvalidLegacy { source: String, preview: String },
    /// Payload parsed but was not an object/record
    UnexpectedShape { found: &'static str },
}

impl SseParseError {
    /// Truncated copy of the payload for log lines.
    pub(crate) fn preview(data: &str) -> String {
        const MAX: usize = 80;
        match data.char_indices().nth(MAX) {
            Some((idx, _)) => format!("{}...", &data[..idx]),
            None => data.to_string(),
        }
    }
}

impl std::fmt::Display for SseParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SseParseError::InvalidJson { source, preview } => {
                write!(f, "Invalid JSON payload ({}): {}", source, preview)
            }
            SseParseError::InvalidLegacy { source, preview } => {
                write!(f, "Invalid bracketed payload ({}): {}", source, preview)
            }
            SseParseError::UnexpectedShape { found } => {
                write!(f, "Expected an object payload, found {}", found)
            }
        }
    }
}

impl std::error::Error for SseParseError {}
