//! Caller-facing callbacks.

use std::fmt;

use tokio::sync::mpsc;

use crate::error::ErrorKind;
use crate::models::AnswerRecord;

/// Receives the progress of one session.
///
/// Exactly one of [`on_error`](Self::on_error) or
/// [`on_complete`](Self::on_complete) is called per session. Cancellation is
/// reported through `on_complete`.
pub trait StreamHandler: Send {
    /// The server accepted the request.
    fn on_start(&mut self) {}

    /// A parsed answer update.
    fn on_data(&mut self, record: AnswerRecord);

    /// The session failed.
    fn on_error(&mut self, kind: ErrorKind, message: &str);

    /// The session finished or was cancelled.
    fn on_complete(&mut self);
}

type StartFn = Box<dyn FnMut() + Send>;
type DataFn = Box<dyn FnMut(AnswerRecord) + Send>;
type ErrorFn = Box<dyn FnMut(ErrorKind, &str) + Send>;
type CompleteFn = Box<dyn FnMut() + Send>;

/// Closure-based [`StreamHandler`]. Unset callbacks are no-ops.
///
/// ```
/// use ragstream::Callbacks;
///
/// let handler = Callbacks::new()
///     .with_data(|record| println!("{}", record.text))
///     .with_error(|kind, message| eprintln!("{}: {}", kind, message));
/// ```
#[derive(Default)]
pub struct Callbacks {
    start: Option<StartFn>,
    data: Option<DataFn>,
    error: Option<ErrorFn>,
    complete: Option<CompleteFn>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.start = Some(Box::new(f));
        self
    }

    pub fn with_data(mut self, f: impl FnMut(AnswerRecord) + Send + 'static) -> Self {
        self.data = Some(Box::new(f));
        self
    }

    pub fn with_error(mut self, f: impl FnMut(ErrorKind, &str) + Send + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    pub fn with_complete(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.complete = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("start", &self.start.is_some())
            .field("data", &self.data.is_some())
            .field("error", &self.error.is_some())
            .field("complete", &self.complete.is_some())
            .finish()
    }
}

impl StreamHandler for Callbacks {
    fn on_start(&mut self) {
        if let Some(f) = self.start.as_mut() {
            f();
        }
    }

    fn on_data(&mut self, record: AnswerRecord) {
        if let Some(f) = self.data.as_mut() {
            f(record);
        }
    }

    fn on_error(&mut self, kind: ErrorKind, message: &str) {
        if let Some(f) = self.error.as_mut() {
            f(kind, message);
        }
    }

    fn on_complete(&mut self) {
        if let Some(f) = self.complete.as_mut() {
            f();
        }
    }
}

/// Handler callbacks as values, for consumers that prefer a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Started,
    Data(AnswerRecord),
    Error { kind: ErrorKind, message: String },
    Completed,
}

impl SessionEvent {
    /// Whether this is the session's last event.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionEvent::Error { .. } | SessionEvent::Completed)
    }
}

/// Forwards every callback as a [`SessionEvent`]. A dropped receiver is not an error.
impl StreamHandler for mpsc::UnboundedSender<SessionEvent> {
    fn on_start(&mut self) {
        let _ = self.send(SessionEvent::Started);
    }

    fn on_data(&mut self, record: AnswerRecord) {
        let _ = self.send(SessionEvent::Data(record));
    }

    fn on_error(&mut self, kind: ErrorKind, message: &str) {
        let _ = self.send(SessionEvent::Error {
            kind,
            message: message.to_string(),
        });
    }

    fn on_complete(&mut self) {
        let _ = self.send(SessionEvent::Completed);
    }
}
