//! End-to-end session tests over the mock transport.
//!
//! Time is paused, so timers fire as soon as every task is idle and elapsed
//! durations are exact.

mod common;

use std::time::Duration;

use common::*;
use ragstream::adapters::MockTransport;
use ragstream::stream::TimerKind;
use ragstream::traits::{CancelMethod, TransportError};
use ragstream::{
    Citation, CompletionReason, ErrorKind, SessionEvent, SessionOutcome, StreamConfig, StreamError,
};
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_happy_path_delivers_records_and_completes() {
    let transport = MockTransport::new()
        .accept()
        .chunk(sse_data(
            r#"{"answer":"hi","docAggs":[{"doc_id":"d1","doc_name":"A.pdf","count":2}]}"#,
        ))
        .delay(Duration::from_millis(200))
        .chunk(answer_event(" there"))
        .chunk(end_event());
    let (handle, mut rx) = open_session(&transport, StreamConfig::default());

    let events = collect_until_terminal(&mut rx).await;
    assert_eq!(events.first(), Some(&SessionEvent::Started));
    assert_eq!(events.last(), Some(&SessionEvent::Completed));
    assert_eq!(answer_text(&events), "hi there");

    let SessionEvent::Data(first) = &events[1] else {
        panic!("expected data, got {:?}", events[1]);
    };
    assert_eq!(first.citations, vec![Citation::new("d1", "A.pdf", "")]);
    assert!(!first.is_end_marker());

    assert_eq!(
        handle.join().await.unwrap(),
        SessionOutcome::Completed(CompletionReason::EndFlag)
    );
    assert_eq!(transport.cancel_calls(), vec![CancelMethod::Abort]);
}

#[tokio::test(start_paused = true)]
async fn test_request_carries_sse_headers_and_camel_case_body() {
    let transport = MockTransport::new().accept().chunk(end_event());
    let config = StreamConfig::default().with_token("secret");
    let (handle, _rx) = open_session(&transport, config);
    handle.join().await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.url, "http://rag.test/api/v1/deepseek");
    assert_eq!(request.headers["Accept"], "text/event-stream");
    assert_eq!(request.headers["Authorization"], "Bearer secret");

    let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(body["chatId"], "chat-test");
    assert_eq!(body["sessionId"], "session-test");
    assert_eq!(body["userId"], "user-test");
}

#[tokio::test(start_paused = true)]
async fn test_framing_is_invariant_to_fragment_boundaries() {
    let body = format!(
        "{}{}{}{}",
        answer_event("café ✓ "),
        ": keep-alive\r\n\r\n",
        "data: ChatResponse[answer=legacy, text, docAggs=[DocAgg[doc_name=B.docx, doc_id=d2, count=1]], data=false]\r\n\r\n",
        end_event()
    );

    let whole = MockTransport::new().accept().chunk(body.clone().into_bytes());
    let (_, mut rx) = open_session(&whole, StreamConfig::default());
    let expected = collect_until_terminal(&mut rx).await;

    let mut sliced = MockTransport::new().accept();
    for byte in body.as_bytes() {
        sliced = sliced.chunk(vec![*byte]);
    }
    let (_, mut rx) = open_session(&sliced, StreamConfig::default());
    let actual = collect_until_terminal(&mut rx).await;

    assert_eq!(actual, expected);
    assert_eq!(answer_text(&actual), "café ✓ legacy, text");
}

#[tokio::test(start_paused = true)]
async fn test_heartbeats_do_not_rearm_inactivity() {
    let transport = MockTransport::new()
        .accept()
        .chunk(answer_event("first"))
        .delay(Duration::from_secs(5))
        .chunk(": keep-alive\n\n")
        .delay(Duration::from_secs(10))
        .chunk(answer_event("too late"));
    let start = Instant::now();
    let (handle, mut rx) = open_session(&transport, StreamConfig::default());

    let events = collect_until_terminal(&mut rx).await;
    assert_eq!(answer_text(&events), "first");
    assert_eq!(
        handle.join().await.unwrap(),
        SessionOutcome::Completed(CompletionReason::Inactivity)
    );
    assert_eq!(start.elapsed(), Duration::from_secs(8));
}

#[tokio::test(start_paused = true)]
async fn test_sliced_heartbeats_never_count_as_activity() {
    let heartbeats = ": keep-alive\n\ncomment: keep-alive\n\n";

    for slice in [1, 3, 7, heartbeats.len()] {
        let mut transport = MockTransport::new().accept();
        for piece in heartbeats.as_bytes().chunks(slice) {
            transport = transport
                .delay(Duration::from_secs(1))
                .chunk(piece.to_vec());
        }
        let start = Instant::now();
        let (handle, mut rx) = open_session(&transport, StreamConfig::default());

        let events = collect_until_terminal(&mut rx).await;
        assert_eq!(events.len(), 2, "slice {}", slice);
        assert!(matches!(
            events.last(),
            Some(SessionEvent::Error { kind: ErrorKind::Timeout, .. })
        ));
        assert_eq!(
            handle.join().await.unwrap(),
            SessionOutcome::Failed(StreamError::Timeout {
                timer: TimerKind::Inactivity,
                duration_ms: 30_000
            }),
            "slice {}",
            slice
        );
        assert_eq!(start.elapsed(), Duration::from_secs(30), "slice {}", slice);
    }
}

#[tokio::test(start_paused = true)]
async fn test_inactivity_before_data_is_a_timeout_error() {
    let transport = MockTransport::new().accept();
    let start = Instant::now();
    let (handle, mut rx) = open_session(&transport, StreamConfig::default());

    let events = collect_until_terminal(&mut rx).await;
    assert_eq!(events[0], SessionEvent::Started);
    assert!(matches!(
        events.last(),
        Some(SessionEvent::Error { kind: ErrorKind::Timeout, .. })
    ));
    assert_eq!(
        handle.join().await.unwrap(),
        SessionOutcome::Failed(StreamError::Timeout {
            timer: TimerKind::Inactivity,
            duration_ms: 30_000
        })
    );
    assert_eq!(start.elapsed(), Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_overall_deadline_stops_a_slow_stream() {
    let mut transport = MockTransport::new().accept();
    for i in 0..20 {
        transport = transport
            .chunk(answer_event(&format!("{} ", i)))
            .delay(Duration::from_secs(5));
    }
    let start = Instant::now();
    let (handle, mut rx) = open_session(&transport, StreamConfig::default());

    let events = collect_until_terminal(&mut rx).await;
    assert_eq!(terminal_count(&events), 1);
    assert!(matches!(
        handle.join().await.unwrap(),
        SessionOutcome::Failed(StreamError::Timeout {
            timer: TimerKind::Overall,
            duration_ms: 60_000
        })
    ));
    assert_eq!(start.elapsed(), Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_three_empty_frames_complete_the_stream() {
    let transport = MockTransport::new()
        .accept()
        .chunk(answer_event("partial answer"))
        .chunk("data: not-json\n\n")
        .chunk(Vec::<u8>::new())
        .chunk("data: {\"unterminated\": \n\n");
    let (handle, mut rx) = open_session(&transport, StreamConfig::default());

    let events = collect_until_terminal(&mut rx).await;
    assert_eq!(answer_text(&events), "partial answer");
    assert_eq!(events.last(), Some(&SessionEvent::Completed));
    assert_eq!(
        handle.join().await.unwrap(),
        SessionOutcome::Completed(CompletionReason::EmptyFrames)
    );
}

#[tokio::test(start_paused = true)]
async fn test_drained_legacy_marker_completes() {
    let transport = MockTransport::new()
        .accept()
        .chunk(answer_event("answer"))
        .chunk("data: ChatResponse[answer=null, docAggs=[]]\n\n");
    let (handle, _rx) = open_session(&transport, StreamConfig::default());

    assert_eq!(
        handle.join().await.unwrap(),
        SessionOutcome::Completed(CompletionReason::Drained)
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancel_twice_reports_one_completion() {
    let transport = MockTransport::new().accept().chunk(answer_event("streaming"));
    let (handle, mut rx) = open_session(&transport, StreamConfig::default());

    assert_eq!(rx.recv().await, Some(SessionEvent::Started));
    assert!(matches!(rx.recv().await, Some(SessionEvent::Data(_))));

    handle.cancel();
    handle.cancel();
    let events = collect_until_terminal(&mut rx).await;
    assert_eq!(events, vec![SessionEvent::Completed]);

    let outcome = handle.join().await.unwrap();
    assert_eq!(outcome, SessionOutcome::Cancelled);
    assert_eq!(transport.cancel_calls(), vec![CancelMethod::Abort]);
    assert!(rx.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_after_completion_is_harmless() {
    let transport = MockTransport::new().accept().chunk(end_event());
    let (handle, mut rx) = open_session(&transport, StreamConfig::default());

    let events = collect_until_terminal(&mut rx).await;
    assert_eq!(terminal_count(&events), 1);
    while !handle.is_finished() {
        tokio::task::yield_now().await;
    }

    handle.cancel();
    assert_eq!(
        handle.join().await.unwrap(),
        SessionOutcome::Completed(CompletionReason::EndFlag)
    );
}

#[tokio::test(start_paused = true)]
async fn test_teardown_probes_close_then_cancel() {
    let transport = MockTransport::new()
        .with_cancel_methods(&[CancelMethod::Cancel, CancelMethod::Close])
        .accept()
        .chunk(end_event());
    let (handle, _rx) = open_session(&transport, StreamConfig::default());
    handle.join().await.unwrap();

    assert_eq!(transport.cancel_calls(), vec![CancelMethod::Close]);
}

#[tokio::test(start_paused = true)]
async fn test_transport_failure_is_reported_once() {
    let transport = MockTransport::new()
        .accept()
        .chunk(answer_event("half"))
        .fail(TransportError::Body("connection reset".to_string()));
    let (handle, mut rx) = open_session(&transport, StreamConfig::default());

    let events = collect_until_terminal(&mut rx).await;
    assert_eq!(terminal_count(&events), 1);
    assert!(matches!(
        events.last(),
        Some(SessionEvent::Error { kind: ErrorKind::Transport, message }) if message.contains("reset")
    ));
    assert!(matches!(
        handle.join().await.unwrap(),
        SessionOutcome::Failed(StreamError::Transport(TransportError::Body(_)))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_issue_failure_is_reported_without_start() {
    let transport =
        MockTransport::new().fail_issue(TransportError::ConnectionFailed("refused".to_string()));
    let (handle, mut rx) = open_session(&transport, StreamConfig::default());

    let events = collect_until_terminal(&mut rx).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        SessionEvent::Error { kind: ErrorKind::Transport, .. }
    ));
    assert!(!handle.join().await.unwrap().is_success());
}

#[tokio::test(start_paused = true)]
async fn test_end_of_body_without_marker_completes() {
    let transport = MockTransport::new()
        .accept()
        .chunk(answer_event("only"))
        .chunk("data: {\"answer\":\"trailing\"}\n")
        .finish();
    let (handle, mut rx) = open_session(&transport, StreamConfig::default());

    let events = collect_until_terminal(&mut rx).await;
    assert_eq!(answer_text(&events), "onlytrailing");
    assert_eq!(
        handle.join().await.unwrap(),
        SessionOutcome::Completed(CompletionReason::TransportFinished)
    );
}

#[tokio::test(start_paused = true)]
async fn test_grace_window_ends_visually_stalled_stream() {
    let transport = MockTransport::new()
        .accept()
        .chunk(answer_event("a"))
        .delay(Duration::from_secs(1))
        .chunk(answer_event("b"));
    let config = StreamConfig::default().with_grace_window(Duration::from_secs(3));
    let start = Instant::now();
    let (handle, mut rx) = open_session(&transport, config);

    let events = collect_until_terminal(&mut rx).await;
    assert_eq!(answer_text(&events), "ab");
    assert_eq!(
        handle.join().await.unwrap(),
        SessionOutcome::Completed(CompletionReason::GraceElapsed)
    );
    assert_eq!(start.elapsed(), Duration::from_secs(4));
}
