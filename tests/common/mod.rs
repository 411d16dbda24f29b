//! Common test utilities for integration tests.
//!
//! Request fixtures, SSE body builders and helpers for collecting the events
//! a session reports.

#![allow(dead_code)]

use std::sync::Arc;

use ragstream::adapters::MockTransport;
use ragstream::{
    CompletionRequest, SessionEvent, SessionHandle, StreamClient, StreamConfig, StreamRequest,
};
use tokio::sync::mpsc;

/// A completion request with fixed test ids.
pub fn test_completion() -> CompletionRequest {
    CompletionRequest {
        chat_id: "chat-test".to_string(),
        question: "What is retrieval-augmented generation?".to_string(),
        session_id: "session-test".to_string(),
        user_id: "user-test".to_string(),
    }
}

/// The stream request for [`test_completion`] against `base_url`.
pub fn test_request(base_url: &str) -> StreamRequest {
    StreamRequest::completion(base_url, &test_completion()).expect("request serializes")
}

/// One complete `data:` event.
pub fn sse_data(payload: &str) -> String {
    format!("data: {}\n\n", payload)
}

/// A JSON answer event with no citations.
pub fn answer_event(text: &str) -> String {
    sse_data(&serde_json::json!({ "answer": text, "docAggs": [] }).to_string())
}

/// The explicit end-flag event.
pub fn end_event() -> String {
    sse_data(r#"{"answer":null,"docAggs":null,"data":true}"#)
}

/// Open a session over `transport` with a channel handler.
pub fn open_session(
    transport: &MockTransport,
    config: StreamConfig,
) -> (SessionHandle, mpsc::UnboundedReceiver<SessionEvent>) {
    let client = StreamClient::new(Arc::new(transport.clone()), config);
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = client.open(test_request("http://rag.test/api/v1"), tx);
    (handle, rx)
}

/// Receive events until the terminal one (inclusive) or the channel closes.
pub async fn collect_until_terminal(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        let terminal = event.is_terminal();
        events.push(event);
        if terminal {
            break;
        }
    }
    events
}

/// Concatenated answer text from every data event.
pub fn answer_text(events: &[SessionEvent]) -> String {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::Data(record) => Some(record.text.as_str()),
            _ => None,
        })
        .collect()
}

/// Number of `Completed`/`Error` events.
pub fn terminal_count(events: &[SessionEvent]) -> usize {
    events.iter().filter(|event| event.is_terminal()).count()
}
