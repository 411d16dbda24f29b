//! The streaming session state machine.
//!
//! [`StreamSession`] owns everything one completion request needs: the text
//! decoder, the frame assembler, the completion detector, the timers and the
//! transport handle. It performs no I/O; the driver in
//! [`client`](super::client) feeds it transport events, timer expiries and
//! cancellations, each stamped with the current instant.
//!
//! All closing paths funnel into one latched finalize step, so timers are
//! cleared, the transport is torn down and a terminal callback fires exactly
//! once. Anything arriving after that is dropped.

use std::fmt;

use tokio::time::Instant;
use uuid::Uuid;

use crate::config::StreamConfig;
use crate::decode::{Decoded, Fragment, TextDecoder};
use crate::error::StreamError;
use crate::models::{AnswerRecord, StreamRequest};
use crate::sse::{parse_payload, FrameAssembler, SseFrame};
use crate::stream::completion::{CompletionDetector, CompletionReason};
use crate::stream::handler::StreamHandler;
use crate::stream::lifecycle::{ActivityTracker, SessionState, TimerKind, TimerSet};
use crate::traits::{
    teardown_transport, TransportError, TransportEvent, TransportHandle, TransportRequest,
};

/// How a session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// Finished normally; reported through `on_complete`
    Completed(CompletionReason),
    /// Cancelled by the caller; reported through `on_complete`
    Cancelled,
    /// Failed; reported through `on_error`
    Failed(StreamError),
}

impl SessionOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, SessionOutcome::Failed(_))
    }
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionOutcome::Completed(reason) => write!(f, "completed ({})", reason),
            SessionOutcome::Cancelled => write!(f, "cancelled"),
            SessionOutcome::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

/// One chat-completion stream.
pub struct StreamSession<H: StreamHandler> {
    id: Uuid,
    request: StreamRequest,
    config: StreamConfig,
    handler: H,
    state: SessionState,
    decoder: TextDecoder,
    assembler: FrameAssembler,
    detector: CompletionDetector,
    activity: ActivityTracker,
    timers: TimerSet,
    transport: Option<Box<dyn TransportHandle>>,
    outcome: Option<SessionOutcome>,
    started_at: Option<Instant>,
    records_delivered: usize,
}

impl<H: StreamHandler> fmt::Debug for StreamSession<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSession")
            .field("id", &self.id)
            .field("endpoint", &self.request.endpoint())
            .field("state", &self.state)
            .field("records_delivered", &self.records_delivered)
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}

impl<H: StreamHandler> StreamSession<H> {
    pub fn new(request: StreamRequest, config: StreamConfig, handler: H) -> Self {
        let activity = ActivityTracker::new(
            config.initial_inactivity_timeout,
            config.streaming_inactivity_timeout,
        );
        Self {
            id: Uuid::new_v4(),
            request,
            config,
            handler,
            state: SessionState::Idle,
            decoder: TextDecoder::new(),
            assembler: FrameAssembler::new(),
            detector: CompletionDetector::new(),
            activity,
            timers: TimerSet::new(),
            transport: None,
            outcome: None,
            started_at: None,
            records_delivered: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn request(&self) -> &StreamRequest {
        &self.request
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Whether the terminal callback has fired.
    pub fn is_completed(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    pub fn into_outcome(self) -> Option<SessionOutcome> {
        self.outcome
    }

    pub fn has_received_data(&self) -> bool {
        self.activity.has_received_data()
    }

    pub fn last_activity_at(&self) -> Option<Instant> {
        self.activity.last_activity_at()
    }

    pub fn consecutive_empty_frames(&self) -> u32 {
        self.detector.consecutive_empty()
    }

    pub fn records_delivered(&self) -> usize {
        self.records_delivered
    }

    pub fn has_transport(&self) -> bool {
        self.transport.is_some()
    }

    /// When the driver should next call [`on_timers`](Self::on_timers).
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    pub fn timer_deadline(&self, kind: TimerKind) -> Option<Instant> {
        self.timers.deadline(kind)
    }

    /// Start the session: arm the overall and initial inactivity timers and
    /// return the request to hand to the transport.
    pub fn open(&mut self, now: Instant) -> Result<TransportRequest, StreamError> {
        if self.state != SessionState::Idle {
            return Err(StreamError::InvalidState {
                operation: "open",
                state: self.state,
            });
        }

        self.transition(SessionState::Connecting);
        self.started_at = Some(now);
        self.timers
            .arm(TimerKind::Overall, now + self.config.overall_timeout);
        self.timers
            .arm(TimerKind::Inactivity, now + self.activity.current_timeout());

        tracing::info!(
            session_id = %self.id,
            endpoint = self.request.endpoint(),
            "Opening stream"
        );
        Ok(self.transport_request())
    }

    fn transport_request(&self) -> TransportRequest {
        let mut request =
            TransportRequest::post(self.request.endpoint(), self.request.payload().to_string())
                .with_header("Content-Type", "application/json")
                .with_header("Accept", "text/event-stream")
                .with_header("Cache-Control", "no-cache")
                .with_header("Connection", "keep-alive");
        if let Some(token) = &self.config.token {
            request = request.with_header("Authorization", format!("Bearer {}", token));
        }
        request
    }

    /// Take ownership of the in-flight request's handle.
    ///
    /// A session that already closed (e.g. cancelled while the request was
    /// being issued) tears the handle down right away.
    pub fn attach(&mut self, mut handle: Box<dyn TransportHandle>) {
        if self.is_completed() {
            tracing::debug!(session_id = %self.id, "Handle attached after close, tearing down");
            teardown_transport(handle.as_mut());
            return;
        }
        self.transport = Some(handle);
    }

    /// Dispatch one transport event.
    pub fn handle_event(&mut self, event: TransportEvent, now: Instant) {
        match event {
            TransportEvent::Accepted { status } => self.on_accepted(status, now),
            TransportEvent::Chunk(fragment) => self.on_fragment(fragment, now),
            TransportEvent::Finished => self.on_finished(now),
            TransportEvent::Failed(err) => self.on_failed(err, now),
        }
    }

    pub fn on_accepted(&mut self, status: u16, _now: Instant) {
        if self.is_completed() {
            return;
        }
        if self.state != SessionState::Connecting {
            tracing::trace!(session_id = %self.id, status, "Duplicate acceptance ignored");
            return;
        }
        tracing::debug!(session_id = %self.id, status, "Stream accepted");
        self.transition(SessionState::Streaming);
        self.handler.on_start();
    }

    pub fn on_fragment(&mut self, fragment: Fragment, now: Instant) {
        if self.is_completed() {
            tracing::trace!(session_id = %self.id, "Fragment after close dropped");
            return;
        }
        if self.state == SessionState::Connecting {
            // data implies the server accepted the request
            self.on_accepted(200, now);
        }

        let text = match self.decoder.decode(fragment) {
            Ok(Decoded::Text(text)) => text,
            Ok(Decoded::Incomplete) => {
                // held bytes always belong to content
                self.mark_activity(now);
                self.detector.reset();
                return;
            }
            Ok(Decoded::Empty) => {
                tracing::trace!(session_id = %self.id, "Empty fragment");
                self.register_empty(now);
                return;
            }
            Err(e) => {
                let err = StreamError::from(e);
                tracing::warn!(
                    session_id = %self.id,
                    code = err.error_code(),
                    "Skipping fragment: {}",
                    err
                );
                self.register_empty(now);
                return;
            }
        };

        // Keep-alive markers only count as seen once the assembler has the
        // whole line, so how the transport slices them does not matter.
        let pushed = self.assembler.push(&text);
        if pushed.has_content {
            self.mark_activity(now);
        } else {
            tracing::trace!(session_id = %self.id, "Fragment without content");
        }
        if pushed.pending {
            // an event is still arriving
            self.detector.reset();
        }
        self.process_frames(pushed.frames, now);
    }

    /// End of body: flush whatever complete data is buffered, then complete.
    pub fn on_finished(&mut self, now: Instant) {
        if self.is_completed() {
            return;
        }
        tracing::debug!(session_id = %self.id, "Transport finished");

        if let Some(tail) = self.decoder.finish() {
            let pushed = self.assembler.push(&tail);
            self.process_frames(pushed.frames, now);
        }
        if !self.is_completed() {
            if let Some(frame) = self.assembler.flush() {
                self.process_frame(frame, now);
            }
        }
        if !self.is_completed() {
            self.finalize(SessionOutcome::Completed(CompletionReason::TransportFinished), now);
        }
    }

    pub fn on_failed(&mut self, err: TransportError, now: Instant) {
        if self.is_completed() {
            tracing::debug!(session_id = %self.id, "Ignoring transport failure after close: {}", err);
            return;
        }
        if err.is_cancellation() {
            tracing::debug!(session_id = %self.id, "Transport reported cancellation");
            self.finalize(SessionOutcome::Cancelled, now);
            return;
        }
        self.finalize(SessionOutcome::Failed(StreamError::Transport(err)), now);
    }

    /// Fire whichever timer has expired, if any.
    pub fn on_timers(&mut self, now: Instant) {
        if self.is_completed() {
            return;
        }
        let Some(kind) = self.timers.expired(now) else {
            return;
        };

        let outcome = match kind {
            TimerKind::Overall => SessionOutcome::Failed(StreamError::Timeout {
                timer: TimerKind::Overall,
                duration_ms: millis(self.config.overall_timeout),
            }),
            TimerKind::Inactivity if self.activity.has_received_data() => {
                SessionOutcome::Completed(CompletionReason::Inactivity)
            }
            TimerKind::Inactivity => SessionOutcome::Failed(StreamError::Timeout {
                timer: TimerKind::Inactivity,
                duration_ms: millis(self.activity.current_timeout()),
            }),
            TimerKind::Grace => SessionOutcome::Completed(CompletionReason::GraceElapsed),
        };
        tracing::debug!(session_id = %self.id, timer = %kind, "Timer expired");
        self.finalize(outcome, now);
    }

    /// Cancel the session. Returns false if it had already closed.
    pub fn cancel(&mut self, now: Instant) -> bool {
        if self.is_completed() {
            tracing::debug!(session_id = %self.id, "Cancel after close ignored");
            return false;
        }
        self.finalize(SessionOutcome::Cancelled, now);
        true
    }

    fn process_frames(&mut self, frames: Vec<SseFrame>, now: Instant) {
        for frame in frames {
            if self.is_completed() {
                break;
            }
            self.process_frame(frame, now);
        }
    }

    fn process_frame(&mut self, frame: SseFrame, now: Instant) {
        let Some(data) = frame.data else {
            tracing::trace!(session_id = %self.id, event = ?frame.event, "Frame without data");
            return;
        };
        if data.trim().is_empty() {
            self.register_empty(now);
            return;
        }

        match parse_payload(&data) {
            Ok(record) => self.deliver(record, now),
            Err(e) => {
                let err = StreamError::from(e);
                tracing::warn!(
                    session_id = %self.id,
                    code = err.error_code(),
                    "Skipping event: {}",
                    err
                );
                self.register_empty(now);
            }
        }
    }

    fn deliver(&mut self, record: AnswerRecord, now: Instant) {
        let end = self.detector.inspect(&record);
        let has_content = record.has_content();

        if end.is_none() || has_content {
            self.records_delivered += 1;
            self.handler.on_data(record);
        }

        match end {
            Some(reason) => self.finalize(SessionOutcome::Completed(reason), now),
            None if has_content => {
                if let Some(window) = self.config.grace_window {
                    self.timers.arm(TimerKind::Grace, now + window);
                }
            }
            None => {}
        }
    }

    fn register_empty(&mut self, now: Instant) {
        if let Some(reason) = self.detector.record_empty() {
            tracing::debug!(
                session_id = %self.id,
                frames = self.detector.consecutive_empty(),
                "Too many empty frames"
            );
            self.finalize(SessionOutcome::Completed(reason), now);
        }
    }

    fn mark_activity(&mut self, now: Instant) {
        let timeout = self.activity.record(now);
        self.timers.arm(TimerKind::Inactivity, now + timeout);
    }

    fn transition(&mut self, next: SessionState) {
        if self.state.can_transition_to(next) {
            tracing::trace!(session_id = %self.id, from = %self.state, to = %next, "State change");
            self.state = next;
        } else {
            tracing::warn!(
                session_id = %self.id,
                from = %self.state,
                to = %next,
                "Rejected state transition"
            );
        }
    }

    fn finalize(&mut self, outcome: SessionOutcome, now: Instant) {
        if self.outcome.is_some() {
            return;
        }

        self.transition(SessionState::Finalizing);
        self.timers.clear();
        if let Some(mut handle) = self.transport.take() {
            teardown_transport(handle.as_mut());
        }
        self.assembler.clear();

        let elapsed_ms = self
            .started_at
            .map(|started| millis(now.saturating_duration_since(started)));
        match &outcome {
            SessionOutcome::Failed(err) => {
                tracing::warn!(
                    session_id = %self.id,
                    code = err.error_code(),
                    hint = err.kind().recovery_hint(),
                    elapsed_ms,
                    "Stream failed: {}",
                    err
                );
                self.handler.on_error(err.kind(), &err.to_string());
            }
            _ => {
                tracing::info!(
                    session_id = %self.id,
                    reason = %outcome,
                    records = self.records_delivered,
                    elapsed_ms,
                    "Stream closed"
                );
                self.handler.on_complete();
            }
        }

        self.transition(SessionState::Closed);
        self.outcome = Some(outcome);
    }
}

fn millis(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
