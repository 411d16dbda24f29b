//! Reqwest-based chunked transport.
//!
//! Implements [`ChunkedTransport`] by spawning a tokio task per request that
//! sends the POST, then forwards the response body chunk by chunk on the
//! connection's event channel. Aborting that task is the handle's only
//! cancellation primitive.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::decode::Fragment;
use crate::traits::{
    CancelMethod, ChunkedTransport, Headers, TransportConnection, TransportError, TransportEvent,
    TransportHandle, TransportRequest,
};

/// Chunked transport implementation using reqwest.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use ragstream::adapters::ReqwestTransport;
/// use ragstream::{StreamClient, StreamConfig};
///
/// let client = StreamClient::new(Arc::new(ReqwestTransport::new()), StreamConfig::from_env());
/// ```
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a new ReqwestTransport with default settings.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Create a new ReqwestTransport with a custom reqwest::Client.
    ///
    /// The client should not set an overall request timeout: the session
    /// owns the deadlines.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Get a reference to the underlying reqwest::Client.
    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }

    /// Convert reqwest error to TransportError.
    fn convert_error(err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::ConnectionFailed(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }

    /// Apply headers to a request builder.
    fn apply_headers(
        builder: reqwest::RequestBuilder,
        headers: &Headers,
    ) -> reqwest::RequestBuilder {
        let mut builder = builder;
        for (key, value) in headers {
            builder = builder.header(key, value);
        }
        builder
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkedTransport for ReqwestTransport {
    fn issue(&self, request: &TransportRequest) -> Result<TransportConnection, TransportError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TransportError::Other(format!("no tokio runtime: {}", e)))?;
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| TransportError::Other(format!("invalid method: {}", e)))?;

        let builder = self
            .client
            .request(method, &request.url)
            .body(request.body.clone());
        let builder = Self::apply_headers(builder, &request.headers);

        let (tx, rx) = mpsc::unbounded_channel();
        let task = runtime.spawn(pump(builder, tx));

        Ok(TransportConnection {
            handle: Box::new(TaskHandle { task: Some(task) }),
            events: rx,
        })
    }
}

async fn pump(builder: reqwest::RequestBuilder, tx: mpsc::UnboundedSender<TransportEvent>) {
    let response = match builder.send().await {
        Ok(response) => response,
        Err(e) => {
            let _ = tx.send(TransportEvent::Failed(ReqwestTransport::convert_error(e)));
            return;
        }
    };

    let status = response.status();
    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let _ = tx.send(TransportEvent::Failed(TransportError::Server {
            status: status.as_u16(),
            message,
        }));
        return;
    }

    if tx
        .send(TransportEvent::Accepted {
            status: status.as_u16(),
        })
        .is_err()
    {
        return;
    }

    let mut body = response.bytes_stream();
    while let Some(item) = body.next().await {
        let event = match item {
            Ok(bytes) => TransportEvent::Chunk(Fragment::Binary(bytes)),
            Err(e) => {
                let _ = tx.send(TransportEvent::Failed(TransportError::Body(e.to_string())));
                return;
            }
        };
        if tx.send(event).is_err() {
            // receiver gone: the session already closed
            return;
        }
    }

    let _ = tx.send(TransportEvent::Finished);
}

/// Cancellation handle over the pump task.
#[derive(Debug)]
struct TaskHandle {
    task: Option<JoinHandle<()>>,
}

impl TransportHandle for TaskHandle {
    fn supports(&self, method: CancelMethod) -> bool {
        method == CancelMethod::Abort
    }

    fn invoke(&mut self, method: CancelMethod) -> Result<(), TransportError> {
        if method != CancelMethod::Abort {
            return Err(TransportError::Teardown {
                method,
                message: "unsupported".to_string(),
            });
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
