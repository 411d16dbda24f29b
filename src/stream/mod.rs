//! Streaming sessions.
//!
//! # Module structure
//! - `completion` - End-of-stream heuristics
//! - `lifecycle` - Session states, timers, activity tracking
//! - `handler` - `StreamHandler` callbacks
//! - `session` - The `StreamSession` state machine
//! - `client` - `StreamClient`, the tokio driver

pub mod client;
pub mod completion;
pub mod handler;
pub mod lifecycle;
pub mod session;

pub use client::{SessionHandle, StreamClient};
pub use completion::{CompletionDetector, CompletionReason, EMPTY_FRAME_THRESHOLD};
pub use handler::{Callbacks, SessionEvent, StreamHandler};
pub use lifecycle::{ActivityTracker, SessionState, TimerKind, TimerSet};
pub use session::{SessionOutcome, StreamSession};
