use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use casecall::session::{handle_transcript_event, BoundaryCause, SessionRecord};
use casecall::stt::{StreamingAsrClient, StreamingConfig, TranscriptEvent, TranscriptKind};
use casecall::ws::{ClientEvent, ClientSocket, OutboundFrame};
use casecall::UtteranceSink;

/// Captures completed utterances handed downstream.
#[derive(Default)]
struct RecordingSink {
    utterances: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl UtteranceSink for RecordingSink {
    async fn utterance_boundary(&self, _session_id: &str, _cause: BoundaryCause) {}

    async fn utterance_complete(&self, session_id: &str, text: &str, _confidence: f64) {
        self.utterances
            .lock()
            .await
            .push((session_id.to_string(), text.to_string()));
    }
}

fn session() -> SessionRecord {
    let config = StreamingConfig::default();
    let asr = Arc::new(StreamingAsrClient::new(config.clone(), "test-key"));
    SessionRecord::new("s-test".into(), config, asr, None)
}

fn event(kind: TranscriptKind, text: &str) -> TranscriptEvent {
    TranscriptEvent::new(kind, text.to_string(), 0.9)
}

#[tokio::test]
async fn test_transcript_appends_log_and_forwards_once() {
    let session = session();
    let (socket, mut rx) = ClientSocket::from_channel(8);
    let sink = RecordingSink::default();

    handle_transcript_event(&session, &socket, &sink, event(TranscriptKind::Partial, "hel"))
        .await;
    handle_transcript_event(
        &session,
        &socket,
        &sink,
        event(TranscriptKind::Final, "hello"),
    )
    .await;

    {
        let inner = session.lock().await;
        assert_eq!(inner.transcript_count, 2);
        assert_eq!(inner.utterance_count, 0);
        assert_eq!(inner.transcript_log().len(), 2);
        assert_eq!(inner.transcript_log()[1].text, "hello");
    }

    // Exactly one frame per non-empty event, in arrival order.
    for expected in ["hel", "hello"] {
        match rx.recv().await {
            Some(OutboundFrame::Event(ClientEvent::Transcript { text, .. })) => {
                assert_eq!(text, expected);
            }
            other => panic!("expected transcript frame, got {:?}", other),
        }
    }
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_turn_counts_utterance_and_feeds_sink() {
    let session = session();
    let (socket, mut rx) = ClientSocket::from_channel(8);
    let sink = RecordingSink::default();

    handle_transcript_event(
        &session,
        &socket,
        &sink,
        event(TranscriptKind::Turn, "I would size the market top-down"),
    )
    .await;

    {
        let inner = session.lock().await;
        assert_eq!(inner.utterance_count, 1);
        assert_eq!(inner.transcript_count, 1);
    }

    let handed = sink.utterances.lock().await;
    assert_eq!(handed.len(), 1);
    assert_eq!(handed[0].1, "I would size the market top-down");

    match rx.recv().await {
        Some(OutboundFrame::Event(ClientEvent::Transcript {
            message_type,
            is_final,
            ..
        })) => {
            assert_eq!(message_type, "Turn");
            assert!(is_final);
        }
        other => panic!("expected turn frame, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_turn_is_not_counted_or_forwarded() {
    let session = session();
    let (socket, mut rx) = ClientSocket::from_channel(8);
    let sink = RecordingSink::default();

    handle_transcript_event(&session, &socket, &sink, event(TranscriptKind::Turn, "")).await;

    {
        let inner = session.lock().await;
        assert_eq!(inner.utterance_count, 0);
        // Bookkeeping still ran.
        assert_eq!(inner.transcript_count, 1);
        assert!(inner.transcript_log().is_empty());
    }
    assert!(rx.try_recv().is_err());
    assert!(sink.utterances.lock().await.is_empty());
}

#[tokio::test]
async fn test_session_begins_records_external_id_silently() {
    let session = session();
    let (socket, mut rx) = ClientSocket::from_channel(8);
    let sink = RecordingSink::default();

    let mut begins = event(TranscriptKind::SessionBegins, "");
    begins.session_id = Some("ext-123".into());
    handle_transcript_event(&session, &socket, &sink, begins).await;

    {
        let inner = session.lock().await;
        assert_eq!(inner.asr_session_id.as_deref(), Some("ext-123"));
        assert!(inner.transcript_log().is_empty());
    }
    // Nothing forwarded for an empty-text event.
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_external_id_is_only_learned_when_unset() {
    let session = session();
    let (socket, _rx) = ClientSocket::from_channel(8);
    let sink = RecordingSink::default();

    let mut first = event(TranscriptKind::Partial, "one");
    first.session_id = Some("ext-a".into());
    handle_transcript_event(&session, &socket, &sink, first).await;

    let mut second = event(TranscriptKind::Partial, "two");
    second.session_id = Some("ext-b".into());
    handle_transcript_event(&session, &socket, &sink, second).await;

    let inner = session.lock().await;
    assert_eq!(inner.asr_session_id.as_deref(), Some("ext-a"));
}

#[tokio::test]
async fn test_forwarded_frame_carries_event_session_id() {
    let session = session();
    let (socket, mut rx) = ClientSocket::from_channel(8);
    let sink = RecordingSink::default();

    let mut final_event = event(TranscriptKind::Final, "done");
    final_event.session_id = Some("ext-xyz".into());
    handle_transcript_event(&session, &socket, &sink, final_event).await;

    match rx.recv().await {
        Some(OutboundFrame::Event(ClientEvent::Transcript { session_id, .. })) => {
            assert_eq!(session_id.as_deref(), Some("ext-xyz"));
        }
        other => panic!("expected transcript frame, got {:?}", other),
    }
}
