//! Mock chunked transport for testing.
//!
//! Plays back a scripted sequence of transport events, optionally separated
//! by delays, and records every issued request and every cancellation
//! primitive the session invokes. After the script runs out the connection
//! stays open, like a server that stopped sending without closing.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::decode::Fragment;
use crate::traits::{
    CancelMethod, ChunkedTransport, TransportConnection, TransportError, TransportEvent,
    TransportHandle, TransportRequest,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One step of a mock script.
#[derive(Debug, Clone, PartialEq)]
pub enum MockStep {
    /// Deliver an event
    Event(TransportEvent),
    /// Wait before the next step
    Delay(Duration),
}

/// Shared record of invoked cancellation primitives.
#[derive(Debug, Clone, Default)]
pub struct CancelLog(Arc<Mutex<Vec<CancelMethod>>>);

impl CancelLog {
    pub fn calls(&self) -> Vec<CancelMethod> {
        lock(&self.0).clone()
    }

    fn push(&self, method: CancelMethod) {
        lock(&self.0).push(method);
    }
}

/// Mock transport handle exposing a configurable set of cancel methods.
#[derive(Debug)]
pub struct MockHandle {
    supported: Vec<CancelMethod>,
    log: CancelLog,
    feeder: Option<JoinHandle<()>>,
}

impl MockHandle {
    pub fn new(supported: &[CancelMethod], log: CancelLog) -> Self {
        Self {
            supported: supported.to_vec(),
            log,
            feeder: None,
        }
    }
}

impl TransportHandle for MockHandle {
    fn supports(&self, method: CancelMethod) -> bool {
        self.supported.contains(&method)
    }

    fn invoke(&mut self, method: CancelMethod) -> Result<(), TransportError> {
        self.log.push(method);
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
        Ok(())
    }
}

/// Mock chunked transport for testing.
///
/// # Example
///
/// ```ignore
/// let transport = MockTransport::new()
///     .accept()
///     .chunk("data: {\"answer\":\"hi\"}\n\n")
///     .delay(Duration::from_secs(1))
///     .finish();
/// ```
#[derive(Debug, Clone)]
pub struct MockTransport {
    script: Vec<MockStep>,
    supported: Vec<CancelMethod>,
    issue_error: Option<TransportError>,
    requests: Arc<Mutex<Vec<TransportRequest>>>,
    cancels: CancelLog,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Create a mock with an empty script whose handle supports `abort`.
    pub fn new() -> Self {
        Self {
            script: Vec::new(),
            supported: vec![CancelMethod::Abort],
            issue_error: None,
            requests: Arc::new(Mutex::new(Vec::new())),
            cancels: CancelLog::default(),
        }
    }

    /// Append an arbitrary event.
    pub fn then(mut self, event: TransportEvent) -> Self {
        self.script.push(MockStep::Event(event));
        self
    }

    /// Append an acceptance with status 200.
    pub fn accept(self) -> Self {
        self.then(TransportEvent::Accepted { status: 200 })
    }

    /// Append a body fragment.
    pub fn chunk(self, fragment: impl Into<Fragment>) -> Self {
        self.then(TransportEvent::Chunk(fragment.into()))
    }

    /// Append a pause.
    pub fn delay(mut self, duration: Duration) -> Self {
        self.script.push(MockStep::Delay(duration));
        self
    }

    /// Append a normal end of body.
    pub fn finish(self) -> Self {
        self.then(TransportEvent::Finished)
    }

    /// Append a failure.
    pub fn fail(self, error: TransportError) -> Self {
        self.then(TransportEvent::Failed(error))
    }

    /// Make `issue` itself fail.
    pub fn fail_issue(mut self, error: TransportError) -> Self {
        self.issue_error = Some(error);
        self
    }

    /// Set the cancel methods the handle exposes.
    pub fn with_cancel_methods(mut self, methods: &[CancelMethod]) -> Self {
        self.supported = methods.to_vec();
        self
    }

    /// Requests issued so far.
    pub fn requests(&self) -> Vec<TransportRequest> {
        lock(&self.requests).clone()
    }

    /// Cancellation primitives invoked so far, across all connections.
    pub fn cancel_calls(&self) -> Vec<CancelMethod> {
        self.cancels.calls()
    }
}

impl ChunkedTransport for MockTransport {
    fn issue(&self, request: &TransportRequest) -> Result<TransportConnection, TransportError> {
        lock(&self.requests).push(request.clone());
        if let Some(err) = &self.issue_error {
            return Err(err.clone());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let script = self.script.clone();
        let feeder = tokio::spawn(async move {
            for step in script {
                match step {
                    MockStep::Delay(duration) => tokio::time::sleep(duration).await,
                    MockStep::Event(event) => {
                        if tx.send(event).is_err() {
                            return;
                        }
                    }
                }
            }
            // hold the connection open until torn down
            std::future::pending::<()>().await;
        });

        let mut handle = MockHandle::new(&self.supported, self.cancels.clone());
        handle.feeder = Some(feeder);
        Ok(TransportConnection {
            handle: Box::new(handle),
            events: rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_plays_script_in_order() {
        let transport = MockTransport::new().accept().chunk("data: x\n\n").finish();
        let mut connection = transport
            .issue(&TransportRequest::post("http://mock/deepseek", "{}"))
            .unwrap();

        assert_eq!(
            connection.events.recv().await,
            Some(TransportEvent::Accepted { status: 200 })
        );
        assert_eq!(
            connection.events.recv().await,
            Some(TransportEvent::Chunk(Fragment::from("data: x\n\n")))
        );
        assert_eq!(connection.events.recv().await, Some(TransportEvent::Finished));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_issue_error() {
        let transport = MockTransport::new()
            .fail_issue(TransportError::ConnectionFailed("refused".to_string()));
        let result = transport.issue(&TransportRequest::post("http://mock", "{}"));
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_handle_records_teardown() {
        let transport = MockTransport::new().with_cancel_methods(&[CancelMethod::Cancel]);
        let mut connection = transport
            .issue(&TransportRequest::post("http://mock", "{}"))
            .unwrap();

        assert!(!connection.handle.supports(CancelMethod::Abort));
        let used = crate::traits::teardown_transport(connection.handle.as_mut());
        assert_eq!(used, Some(CancelMethod::Cancel));
        assert_eq!(transport.cancel_calls(), vec![CancelMethod::Cancel]);
    }
}
