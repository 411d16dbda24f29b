//! Async driver for streaming sessions.
//!
//! [`StreamClient::open`] spawns one tokio task per session. The task issues
//! the request and then loops over three sources, one at a time: the
//! cancellation channel, the transport's event channel, and the session's
//! earliest timer deadline.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use uuid::Uuid;

use crate::adapters::ReqwestTransport;
use crate::config::StreamConfig;
use crate::error::StreamError;
use crate::models::{CompletionRequest, StreamRequest};
use crate::stream::handler::StreamHandler;
use crate::stream::session::{SessionOutcome, StreamSession};
use crate::traits::{ChunkedTransport, TransportEvent};

/// Opens streaming sessions over a [`ChunkedTransport`].
#[derive(Clone)]
pub struct StreamClient {
    transport: Arc<dyn ChunkedTransport>,
    config: StreamConfig,
}

impl std::fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StreamClient {
    pub fn new(transport: Arc<dyn ChunkedTransport>, config: StreamConfig) -> Self {
        Self { transport, config }
    }

    /// Client backed by a default [`ReqwestTransport`].
    pub fn with_reqwest(config: StreamConfig) -> Self {
        Self::new(Arc::new(ReqwestTransport::new()), config)
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Build a chat-completion request against the configured base URL.
    pub fn completion_request(
        &self,
        request: &CompletionRequest,
    ) -> Result<StreamRequest, serde_json::Error> {
        StreamRequest::completion(&self.config.base_url, request)
    }

    /// Start streaming `request`, reporting progress to `handler`.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn open<H>(&self, request: StreamRequest, handler: H) -> SessionHandle
    where
        H: StreamHandler + 'static,
    {
        let session = StreamSession::new(request, self.config.clone(), handler);
        let id = session.id();
        let (cancel_tx, cancel_rx) = mpsc::unbounded_channel();
        let transport = Arc::clone(&self.transport);

        let task = tokio::spawn(drive(session, transport, cancel_rx));
        SessionHandle {
            id,
            cancel_tx,
            task,
        }
    }
}

/// Caller's handle on a running session.
#[derive(Debug)]
pub struct SessionHandle {
    id: Uuid,
    cancel_tx: mpsc::UnboundedSender<()>,
    task: JoinHandle<SessionOutcome>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Request cancellation. Safe to call repeatedly and after completion.
    pub fn cancel(&self) {
        if self.cancel_tx.send(()).is_err() {
            tracing::trace!(session_id = %self.id, "Cancel after session ended");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session to end.
    pub async fn join(self) -> Result<SessionOutcome, StreamError> {
        Ok(self.task.await?)
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn drive<H: StreamHandler>(
    mut session: StreamSession<H>,
    transport: Arc<dyn ChunkedTransport>,
    mut cancel_rx: mpsc::UnboundedReceiver<()>,
) -> SessionOutcome {
    let request = match session.open(Instant::now()) {
        Ok(request) => request,
        Err(err) => return SessionOutcome::Failed(err),
    };

    let mut events = match transport.issue(&request) {
        Ok(connection) => {
            session.attach(connection.handle);
            connection.events
        }
        Err(err) => {
            session.on_failed(err, Instant::now());
            mpsc::unbounded_channel::<TransportEvent>().1
        }
    };

    let mut events_open = true;
    while !session.is_completed() {
        let deadline = session.next_deadline();
        tokio::select! {
            biased;

            Some(()) = cancel_rx.recv() => {
                session.cancel(Instant::now());
            }
            event = events.recv(), if events_open => match event {
                Some(event) => session.handle_event(event, Instant::now()),
                None => {
                    tracing::debug!(session_id = %session.id(), "Transport channel closed");
                    events_open = false;
                    session.on_finished(Instant::now());
                }
            },
            _ = wait_for(deadline) => {
                session.on_timers(Instant::now());
            }
        }
    }

    session.into_outcome().unwrap_or(SessionOutcome::Cancelled)
}
