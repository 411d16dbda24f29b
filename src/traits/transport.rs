//! Chunked transport trait abstraction.
//!
//! The streaming core never talks to an HTTP library directly. It issues a
//! request through [`ChunkedTransport`], receives progress as
//! [`TransportEvent`]s on a channel, and tears the request down through the
//! [`TransportHandle`] capability interface.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::decode::Fragment;

/// HTTP headers represented as a key-value map.
pub type Headers = HashMap<String, String>;

/// A fully-specified request handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    /// Absolute URL of the streaming endpoint
    pub url: String,
    /// HTTP method, `POST` for completions
    pub method: String,
    /// Request headers
    pub headers: Headers,
    /// Serialized request body
    pub body: String,
}

impl TransportRequest {
    /// Create a POST request with no headers.
    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "POST".to_string(),
            headers: Headers::new(),
            body: body.into(),
        }
    }

    /// Add a header, replacing any previous value.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Transport-level failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    /// Connection could not be established
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    /// The transport's own timeout elapsed
    #[error("Request timeout: {0}")]
    Timeout(String),
    /// Server answered with a non-success status
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },
    /// The request was aborted, usually by our own teardown
    #[error("Request cancelled")]
    Cancelled,
    /// Reading the response body failed mid-stream
    #[error("Body read failed: {0}")]
    Body(String),
    /// The cancellation primitive itself failed
    #[error("Teardown failed via {method}: {message}")]
    Teardown { method: CancelMethod, message: String },
    /// Anything else
    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Whether this failure is the echo of an intentional cancellation.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, TransportError::Cancelled)
    }
}

/// Progress reported by a transport for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The server accepted the request (headers received, 2xx status)
    Accepted { status: u16 },
    /// A raw body fragment
    Chunk(Fragment),
    /// The body ended normally
    Finished,
    /// The request failed
    Failed(TransportError),
}

/// Names under which a platform may expose request cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelMethod {
    Abort,
    Close,
    Cancel,
}

impl CancelMethod {
    /// Probe order, most preferred first.
    pub const PREFERENCE: [CancelMethod; 3] =
        [CancelMethod::Abort, CancelMethod::Close, CancelMethod::Cancel];

    pub fn as_str(&self) -> &'static str {
        match self {
            CancelMethod::Abort => "abort",
            CancelMethod::Close => "close",
            CancelMethod::Cancel => "cancel",
        }
    }
}

impl fmt::Display for CancelMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability interface over an in-flight request.
///
/// Implementations report which cancellation primitives they expose; the
/// core picks one with [`teardown_transport`] instead of branching on the
/// platform at every call site.
pub trait TransportHandle: Send {
    /// Whether `method` is available on this handle.
    fn supports(&self, method: CancelMethod) -> bool;

    /// Invoke `method`. Only called when [`supports`](Self::supports) returned true.
    fn invoke(&mut self, method: CancelMethod) -> Result<(), TransportError>;
}

/// Cancel a request through the most preferred available method.
///
/// Returns the method used, or `None` if the handle exposes none. Failures of
/// the primitive are logged and swallowed: teardown must never surface as a
/// session error.
pub fn teardown_transport(handle: &mut dyn TransportHandle) -> Option<CancelMethod> {
    let method = CancelMethod::PREFERENCE
        .into_iter()
        .find(|method| handle.supports(*method))?;

    match handle.invoke(method) {
        Ok(()) => tracing::debug!(%method, "Transport torn down"),
        Err(e) => tracing::warn!(%method, "Transport teardown failed: {}", e),
    }
    Some(method)
}

/// A live request: its cancellation handle plus the event channel.
pub struct TransportConnection {
    pub handle: Box<dyn TransportHandle>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl fmt::Debug for TransportConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConnection").finish_non_exhaustive()
    }
}

/// Trait for transports that deliver a response body progressively.
///
/// `issue` must return immediately; acceptance, chunks and completion are
/// reported later on the connection's event channel. Implementations that
/// spawn work need to be called from inside a tokio runtime.
pub trait ChunkedTransport: Send + Sync {
    fn issue(&self, request: &TransportRequest) -> Result<TransportConnection, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ProbeHandle {
        supported: Vec<CancelMethod>,
        invoked: Vec<CancelMethod>,
        fail: bool,
    }

    impl TransportHandle for ProbeHandle {
        fn supports(&self, method: CancelMethod) -> bool {
            self.supported.contains(&method)
        }

        fn invoke(&mut self, method: CancelMethod) -> Result<(), TransportError> {
            self.invoked.push(method);
            if self.fail {
                Err(TransportError::Other("boom".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn probe(supported: Vec<CancelMethod>) -> ProbeHandle {
        ProbeHandle {
            supported,
            invoked: Vec::new(),
            fail: false,
        }
    }

    #[test]
    fn test_teardown_prefers_abort() {
        let mut handle = probe(vec![CancelMethod::Cancel, CancelMethod::Abort]);
        assert_eq!(teardown_transport(&mut handle), Some(CancelMethod::Abort));
        assert_eq!(handle.invoked, vec![CancelMethod::Abort]);
    }

    #[test]
    fn test_teardown_falls_back_to_close_then_cancel() {
        let mut handle = probe(vec![CancelMethod::Close, CancelMethod::Cancel]);
        assert_eq!(teardown_transport(&mut handle), Some(CancelMethod::Close));

        let mut handle = probe(vec![CancelMethod::Cancel]);
        assert_eq!(teardown_transport(&mut handle), Some(CancelMethod::Cancel));
    }

    #[test]
    fn test_teardown_without_capability() {
        let mut handle = probe(Vec::new());
        assert_eq!(teardown_transport(&mut handle), None);
        assert!(handle.invoked.is_empty());
    }

    #[test]
    fn test_teardown_swallows_primitive_failure() {
        let mut handle = probe(vec![CancelMethod::Abort]);
        handle.fail = true;
        assert_eq!(teardown_transport(&mut handle), Some(CancelMethod::Abort));
    }

    #[test]
    fn test_transport_error_display() {
        assert_eq!(
            TransportError::Server {
                status: 502,
                message: "Bad Gateway".to_string()
            }
            .to_string(),
            "Server error (502): Bad Gateway"
        );
        assert_eq!(TransportError::Cancelled.to_string(), "Request cancelled");
        assert!(TransportError::Cancelled.is_cancellation());
        assert!(!TransportError::Body("eof".to_string()).is_cancellation());
    }

    #[test]
    fn test_transport_request_builder() {
        let request = TransportRequest::post("http://x/deepseek", "{}")
            .with_header("Accept", "text/event-stream");
        assert_eq!(request.method, "POST");
        assert_eq!(
            request.headers.get("Accept"),
            Some(&"text/event-stream".to_string())
        );
    }
}
