use serde::Serialize;

use crate::stt::TranscriptEvent;

/// Category on an outbound error frame.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum ErrorType {
    #[serde(rename = "STT_ERROR")]
    Stt,
    #[serde(rename = "AUDIO_ERROR")]
    Audio,
}

/// JSON frames sent to the browser client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Transcript update from the streaming ASR.
    Transcript {
        message_type: String,
        text: String,
        confidence: f64,
        is_final: bool,
        /// Server wall-clock, Unix seconds.
        timestamp: i64,
        /// The external ASR session id, when known.
        session_id: Option<String>,
    },
    /// Non-fatal error surfaced to the client.
    Error {
        error_type: ErrorType,
        message: String,
    },
}

impl ClientEvent {
    pub fn transcript(event: &TranscriptEvent) -> Self {
        ClientEvent::Transcript {
            message_type: event.kind.message_type().to_string(),
            text: event.text.clone(),
            confidence: event.confidence,
            is_final: event.is_final,
            timestamp: event.timestamp.timestamp(),
            session_id: event.session_id.clone(),
        }
    }

    pub fn error(error_type: ErrorType, message: impl Into<String>) -> Self {
        ClientEvent::Error {
            error_type,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::TranscriptKind;

    #[test]
    fn test_transcript_frame_shape() {
        let mut event = TranscriptEvent::new(TranscriptKind::Final, "hello".into(), 0.92);
        event.session_id = Some("ext-1".into());

        let json = serde_json::to_value(ClientEvent::transcript(&event)).unwrap();
        assert_eq!(json["type"], "transcript");
        assert_eq!(json["message_type"], "FinalTranscript");
        assert_eq!(json["text"], "hello");
        assert_eq!(json["is_final"], true);
        assert_eq!(json["session_id"], "ext-1");
        assert!(json["timestamp"].is_i64());
    }

    #[test]
    fn test_error_frame_shape() {
        let json =
            serde_json::to_value(ClientEvent::error(ErrorType::Stt, "server error")).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["error_type"], "STT_ERROR");
        assert_eq!(json["message"], "server error");

        let json = serde_json::to_value(ClientEvent::error(ErrorType::Audio, "bad frame")).unwrap();
        assert_eq!(json["error_type"], "AUDIO_ERROR");
    }
}
