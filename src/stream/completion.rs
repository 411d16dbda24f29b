//! Completion heuristics.
//!
//! The upstream protocol has no reserved terminal frame, so the end of a
//! stream is inferred from several independent signals. Whichever fires
//! first wins:
//!
//! - the payload's end flag (`data == true`)
//! - a record whose answer and citations are both null or empty ("drained")
//! - [`EMPTY_FRAME_THRESHOLD`] consecutive empty or unparseable frames
//! - inactivity after data has flowed (see [`lifecycle`](super::lifecycle))
//!
//! The explicit flag and the drained marker are treated as equally
//! authoritative. Different backend versions emit one or the other; the
//! drained path is a compatibility shim and may go away once every backend
//! sends the flag.

use std::fmt;

use crate::models::{AnswerRecord, EndSignal};
use crate::sse::payloads::RawAnswer;

/// Consecutive empty/unparseable frames that end a stream.
pub const EMPTY_FRAME_THRESHOLD: u32 = 3;

/// Why a session completed normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionReason {
    /// A record carried the explicit end flag
    EndFlag,
    /// A record had neither answer nor citations
    Drained,
    /// Too many consecutive empty frames
    EmptyFrames,
    /// Data stopped arriving after the stream had started
    Inactivity,
    /// The transport reported end of body
    TransportFinished,
    /// No new content within the post-content grace window
    GraceElapsed,
}

impl CompletionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionReason::EndFlag => "end_flag",
            CompletionReason::Drained => "drained",
            CompletionReason::EmptyFrames => "empty_frames",
            CompletionReason::Inactivity => "inactivity",
            CompletionReason::TransportFinished => "transport_finished",
            CompletionReason::GraceElapsed => "grace_elapsed",
        }
    }
}

impl fmt::Display for CompletionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<EndSignal> for CompletionReason {
    fn from(signal: EndSignal) -> Self {
        match signal {
            EndSignal::ExplicitFlag => CompletionReason::EndFlag,
            EndSignal::Drained => CompletionReason::Drained,
        }
    }
}

/// Decide whether a normalized payload is an end marker.
///
/// The explicit flag wins even when the record still carries citations.
pub(crate) fn detect_end_signal(raw: &RawAnswer) -> Option<EndSignal> {
    if raw.end_flag {
        return Some(EndSignal::ExplicitFlag);
    }
    let citations_empty = raw.citations.as_ref().map_or(true, Vec::is_empty);
    if raw.answer.is_none() && citations_empty {
        return Some(EndSignal::Drained);
    }
    None
}

/// Tracks the frame-level heuristics across one session.
#[derive(Debug, Clone)]
pub struct CompletionDetector {
    consecutive_empty: u32,
    threshold: u32,
}

impl Default for CompletionDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionDetector {
    pub fn new() -> Self {
        Self {
            consecutive_empty: 0,
            threshold: EMPTY_FRAME_THRESHOLD,
        }
    }

    /// Count one empty or unparseable frame.
    ///
    /// Returns [`CompletionReason::EmptyFrames`] once the threshold is reached.
    pub fn record_empty(&mut self) -> Option<CompletionReason> {
        self.consecutive_empty = self.consecutive_empty.saturating_add(1);
        (self.consecutive_empty >= self.threshold).then_some(CompletionReason::EmptyFrames)
    }

    /// Start a new empty-frame run after meaningful input.
    pub fn reset(&mut self) {
        self.consecutive_empty = 0;
    }

    /// Inspect a parsed record, resetting the empty-frame run.
    pub fn inspect(&mut self, record: &AnswerRecord) -> Option<CompletionReason> {
        self.reset();
        record.end_signal.map(CompletionReason::from)
    }

    pub fn consecutive_empty(&self) -> u32 {
        self.consecutive_empty
    }
}
