//! Interfaces to the external collaborators: the context brain that consumes
//! completed utterances and the speech synthesizer that voices its replies.
//! The core only hands data across these seams; response generation lives
//! outside this service.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::session::BoundaryCause;
use crate::tts::TtsClient;

/// Consumer of utterance-level signals from the session supervisor.
#[async_trait]
pub trait UtteranceSink: Send + Sync {
    /// The supervisor decided the candidate stopped talking (or hit the
    /// duration cap). The consumer decides whether a response is warranted.
    async fn utterance_boundary(&self, session_id: &str, cause: BoundaryCause);

    /// The ASR delivered a completed turn.
    async fn utterance_complete(&self, session_id: &str, text: &str, confidence: f64);
}

/// Default sink: logs the handoff and holds the speech synthesizer handle
/// for the response path.
pub struct TranscriptAnalyzer {
    speech: Arc<TtsClient>,
}

impl TranscriptAnalyzer {
    pub fn new(speech: Arc<TtsClient>) -> Self {
        Self { speech }
    }

    /// Voice one piece of interviewer text. Called by the response path once
    /// the external brain has produced a reply.
    pub async fn speak(&self, text: &str) -> anyhow::Result<Vec<u8>> {
        self.speech.synthesize(text).await
    }
}

#[async_trait]
impl UtteranceSink for TranscriptAnalyzer {
    async fn utterance_boundary(&self, session_id: &str, cause: BoundaryCause) {
        debug!(
            "[{}] utterance boundary ({}) handed downstream",
            session_id, cause
        );
    }

    async fn utterance_complete(&self, session_id: &str, text: &str, confidence: f64) {
        info!(
            "[{}] utterance complete (confidence {:.2}): {}",
            session_id, confidence, text
        );
    }
}
