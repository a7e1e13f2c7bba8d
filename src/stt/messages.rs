use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Streaming session parameters, sent as URL query parameters on connect and
/// re-sent in full on `UpdateConfiguration`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    pub sample_rate: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub format_turns: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_of_turn_confidence_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_end_of_turn_silence_when_confident: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_turn_silence: Option<u32>,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            encoding: Some("pcm_s16le".to_string()),
            format_turns: false,
            end_of_turn_confidence_threshold: None,
            min_end_of_turn_silence_when_confident: None,
            max_turn_silence: None,
        }
    }
}

/// Messages sent to the ASR provider.
#[derive(Debug, Serialize)]
#[serde(tag = "message_type")]
pub enum ClientMessage {
    AudioData {
        /// Base64-encoded PCM bytes.
        audio_data: String,
    },
    ForceEndpoint,
    UpdateConfiguration {
        config: StreamingConfig,
    },
    SessionTermination,
}

impl ClientMessage {
    pub fn audio(frame: &[u8]) -> Self {
        ClientMessage::AudioData {
            audio_data: base64::engine::general_purpose::STANDARD.encode(frame),
        }
    }
}

/// Messages received from the ASR provider, keyed by `message_type`.
/// Kinds outside this set are logged and ignored by the reader.
#[derive(Debug, Deserialize)]
#[serde(tag = "message_type")]
pub enum ServerMessage {
    SessionBegins {
        session_id: String,
        #[serde(default)]
        expires_at: Option<String>,
    },
    Connected,
    PartialTranscript {
        #[serde(default)]
        text: String,
        #[serde(default)]
        confidence: f64,
    },
    FinalTranscript {
        #[serde(default)]
        text: String,
        #[serde(default)]
        confidence: f64,
    },
    Turn {
        #[serde(default)]
        text: String,
        #[serde(default)]
        confidence: f64,
        #[serde(default)]
        turn_id: Option<String>,
    },
    Error {
        #[serde(default)]
        error: String,
        #[serde(default)]
        message: String,
    },
    SessionTerminated,
    #[serde(other)]
    Unknown,
}

/// Kind tag on a transcript event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TranscriptKind {
    Partial,
    Final,
    Turn,
    SessionBegins,
    SessionEnds,
}

impl TranscriptKind {
    /// The provider's `message_type` spelling, echoed to the browser client.
    pub fn message_type(&self) -> &'static str {
        match self {
            TranscriptKind::Partial => "PartialTranscript",
            TranscriptKind::Final => "FinalTranscript",
            TranscriptKind::Turn => "Turn",
            TranscriptKind::SessionBegins => "SessionBegins",
            TranscriptKind::SessionEnds => "SessionTerminated",
        }
    }
}

/// One typed transcription result from the streaming session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEvent {
    pub kind: TranscriptKind,
    pub text: String,
    pub confidence: f64,
    pub is_final: bool,
    /// The provider-assigned session id, when known.
    pub session_id: Option<String>,
    pub turn_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl TranscriptEvent {
    pub fn new(kind: TranscriptKind, text: String, confidence: f64) -> Self {
        Self {
            kind,
            text,
            confidence,
            is_final: matches!(kind, TranscriptKind::Final | TranscriptKind::Turn),
            session_id: None,
            turn_id: None,
            timestamp: Utc::now(),
        }
    }
}
