//! Error classification reported to stream handlers.

use std::fmt;

/// High-level categorization of stream failures.
///
/// This is what a handler's `on_error` receives; it decides how the caller
/// should react without matching on every concrete error variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Network-level failure that was not caused by our own cancellation
    Transport,
    /// A fragment could not be turned into text
    Decode,
    /// An event failed to parse under every accepted encoding
    MalformedEvent,
    /// The overall deadline or the inactivity timeout elapsed
    Timeout,
    /// Caller-initiated cancellation; never reported through `on_error`
    Cancelled,
    /// Misuse of the session API or a lost driver task
    Internal,
}

impl ErrorKind {
    /// Whether errors of this kind end the session.
    ///
    /// Decode and parse failures are recovered per event.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            ErrorKind::Transport | ErrorKind::Timeout | ErrorKind::Internal
        )
    }

    /// Returns a short label suitable for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Decode => "decode",
            ErrorKind::MalformedEvent => "malformed_event",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }

    /// Returns suggested recovery actions for this kind.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorKind::Transport => "Check your connection and send the question again",
            ErrorKind::Decode | ErrorKind::MalformedEvent => {
                "Part of the answer could not be read; the rest was kept"
            }
            ErrorKind::Timeout => "The service is slow to respond. Please try again later",
            ErrorKind::Cancelled => "The request was cancelled",
            ErrorKind::Internal => "This may be a bug. Please report this issue if it persists",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_session_fatal() {
        assert!(ErrorKind::Transport.is_session_fatal());
        assert!(ErrorKind::Timeout.is_session_fatal());
        assert!(ErrorKind::Internal.is_session_fatal());
        assert!(!ErrorKind::Decode.is_session_fatal());
        assert!(!ErrorKind::MalformedEvent.is_session_fatal());
        assert!(!ErrorKind::Cancelled.is_session_fatal());
    }

    #[test]
    fn test_kind_as_str_and_display() {
        assert_eq!(ErrorKind::MalformedEvent.as_str(), "malformed_event");
        assert_eq!(format!("{}", ErrorKind::Timeout), "timeout");
    }

    #[test]
    fn test_kind_recovery_hint() {
        assert!(ErrorKind::Transport.recovery_hint().contains("connection"));
        assert!(ErrorKind::Timeout.recovery_hint().contains("try again"));
    }
}
