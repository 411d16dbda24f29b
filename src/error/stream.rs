//! Streaming-related error types.
//!
//! Covers everything that can go wrong between issuing a completion request
//! and the session's terminal callback.

use std::fmt;

use crate::decode::DecodeError;
use crate::error::ErrorKind;
use crate::sse::SseParseError;
use crate::stream::{SessionState, TimerKind};
use crate::traits::TransportError;

/// Stream-specific error variants.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamError {
    /// The transport failed for a reason other than our own cancellation.
    Transport(TransportError),

    /// A fragment could not be decoded to text.
    Decode(DecodeError),

    /// An event payload failed to parse.
    MalformedEvent(SseParseError),

    /// A session timer elapsed.
    Timeout { timer: TimerKind, duration_ms: u64 },

    /// An operation was attempted in the wrong lifecycle state.
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// The driver task panicked or was aborted.
    Task { message: String },
}

impl StreamError {
    /// Classification handed to `on_error`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StreamError::Transport(err) if err.is_cancellation() => ErrorKind::Cancelled,
            StreamError::Transport(_) => ErrorKind::Transport,
            StreamError::Decode(_) => ErrorKind::Decode,
            StreamError::MalformedEvent(_) => ErrorKind::MalformedEvent,
            StreamError::Timeout { .. } => ErrorKind::Timeout,
            StreamError::InvalidState { .. } | StreamError::Task { .. } => ErrorKind::Internal,
        }
    }

    /// Whether this error ends the session. Per-event failures do not.
    pub fn is_session_fatal(&self) -> bool {
        self.kind().is_session_fatal()
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            StreamError::Transport(TransportError::Server { status, .. }) => {
                format!("The answer service returned an error (HTTP {}).", status)
            }
            StreamError::Transport(TransportError::Cancelled) => {
                "The request was cancelled.".to_string()
            }
            StreamError::Transport(_) => {
                "Connection to the answer service failed. Please try again.".to_string()
            }
            StreamError::Decode(_) => "Part of the answer could not be decoded.".to_string(),
            StreamError::MalformedEvent(_) => "Part of the answer could not be read.".to_string(),
            StreamError::Timeout {
                timer: TimerKind::Overall,
                duration_ms,
            } => format!(
                "The answer took longer than {} seconds and was stopped.",
                duration_ms / 1000
            ),
            StreamError::Timeout { duration_ms, .. } => format!(
                "No response from the answer service for {} seconds.",
                duration_ms / 1000
            ),
            StreamError::InvalidState { .. } | StreamError::Task { .. } => {
                "Something went wrong while streaming the answer.".to_string()
            }
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            StreamError::Transport(_) => "E_STREAM_TRANSPORT",
            StreamError::Decode(_) => "E_STREAM_DECODE",
            StreamError::MalformedEvent(_) => "E_STREAM_PARSE",
            StreamError::Timeout { .. } => "E_STREAM_TIMEOUT",
            StreamError::InvalidState { .. } => "E_STREAM_STATE",
            StreamError::Task { .. } => "E_STREAM_TASK",
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Transport(err) => write!(f, "Transport failure: {}", err),
            StreamError::Decode(err) => write!(f, "Decode failure: {}", err),
            StreamError::MalformedEvent(err) => write!(f, "Malformed event: {}", err),
            StreamError::Timeout { timer, duration_ms } => {
                write!(f, "{} timeout after {}ms", timer, duration_ms)
            }
            StreamError::InvalidState { operation, state } => {
                write!(f, "Cannot {} a session in state {}", operation, state)
            }
            StreamError::Task { message } => write!(f, "Session task failed: {}", message),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StreamError::Transport(err) => Some(err),
            StreamError::Decode(err) => Some(err),
            StreamError::MalformedEvent(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TransportError> for StreamError {
    fn from(err: TransportError) -> Self {
        StreamError::Transport(err)
    }
}

impl From<DecodeError> for StreamError {
    fn from(err: DecodeError) -> Self {
        StreamError::Decode(err)
    }
}

impl From<SseParseError> for StreamError {
    fn from(err: SseParseError) -> Self {
        StreamError::MalformedEvent(err)
    }
}

impl From<tokio::task::JoinError> for StreamError {
    fn from(err: tokio::task::JoinError) -> Self {
        StreamError::Task {
            message: err.to_string(),
        }
    }
}
