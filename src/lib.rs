//! ragstream - streaming answer client for a retrieval-augmented chat service
//!
//! Turns a chunked HTTP response into discrete answer updates: decodes raw
//! fragments, reassembles SSE-style event blocks, parses JSON or legacy
//! bracketed payloads, and decides when the stream has ended.
//!
//! ```no_run
//! use ragstream::{CompletionRequest, SessionEvent, StreamClient, StreamConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = StreamClient::with_reqwest(StreamConfig::from_env());
//! let request = client.completion_request(&CompletionRequest {
//!     chat_id: "assistant-1".to_string(),
//!     question: "What is RAG?".to_string(),
//!     session_id: "session-1".to_string(),
//!     user_id: "user-1".to_string(),
//! })?;
//!
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let handle = client.open(request, tx);
//! while let Some(event) = rx.recv().await {
//!     if let SessionEvent::Data(record) = &event {
//!         print!("{}", record.text);
//!     }
//!     if event.is_terminal() {
//!         break;
//!     }
//! }
//! handle.join().await?;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod config;
pub mod decode;
pub mod error;
pub mod logging;
pub mod models;
pub mod sse;
pub mod stream;
pub mod traits;

pub use config::StreamConfig;
pub use error::{ErrorKind, StreamError, StreamResult};
pub use models::{AnswerRecord, Citation, CompletionRequest, EndSignal, StreamRequest};
pub use stream::{
    Callbacks, CompletionReason, SessionEvent, SessionHandle, SessionOutcome, SessionState,
    StreamClient, StreamHandler, StreamSession,
};
