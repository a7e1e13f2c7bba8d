use std::sync::Arc;

use anyhow::Result;

use crate::config::{Config, Secrets};
use crate::downstream::{TranscriptAnalyzer, UtteranceSink};
use crate::session::SessionRegistry;
use crate::tts::TtsClient;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Session registry (session_id → record)
    pub registry: Arc<SessionRegistry>,
    /// Downstream consumer of completed utterances and boundaries
    pub sink: Arc<dyn UtteranceSink>,
    /// Service configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, secrets: Secrets) -> Result<Self> {
        let registry = Arc::new(SessionRegistry::new(secrets.asr_api_key));
        let speech = Arc::new(TtsClient::new(secrets.tts_api_key)?);
        let sink: Arc<dyn UtteranceSink> = Arc::new(TranscriptAnalyzer::new(speech));

        Ok(Self {
            registry,
            sink,
            config: Arc::new(config),
        })
    }
}
