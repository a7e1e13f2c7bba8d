use anyhow::Result;
use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub asr: AsrConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

/// Default audio format for new sessions. Clients may override sample rate
/// and encoding at init.
#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub encoding: String,
}

/// End-of-turn tuning forwarded to the ASR provider at session creation.
#[derive(Debug, Clone, Deserialize)]
pub struct AsrConfig {
    pub format_turns: bool,
    pub end_of_turn_confidence_threshold: f64,
    pub min_end_of_turn_silence_when_confident: u32,
    pub max_turn_silence: u32,
}

impl Config {
    /// Load configuration from an optional TOML file layered over defaults.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("service.name", "casecall")?
            .set_default("service.http.bind", "127.0.0.1")?
            .set_default("service.http.port", 8080)?
            .set_default("audio.sample_rate", 16000)?
            .set_default("audio.encoding", "pcm_s16le")?
            .set_default("asr.format_turns", true)?
            .set_default("asr.end_of_turn_confidence_threshold", 0.7)?
            .set_default("asr.min_end_of_turn_silence_when_confident", 1000)?
            .set_default("asr.max_turn_silence", 3000)?
            .add_source(config::File::with_name(path).required(false))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

/// API keys for the external collaborators, read once at startup.
/// A missing key is fatal: the service cannot transcribe or speak without
/// them.
#[derive(Clone)]
pub struct Secrets {
    pub asr_api_key: String,
    pub tts_api_key: String,
}

impl Secrets {
    pub fn from_env() -> Result<Self, ConfigError> {
        let asr_api_key = std::env::var("ASSEMBLYAI_API_KEY")
            .map_err(|_| ConfigError::MissingKey("ASSEMBLYAI_API_KEY"))?;
        let tts_api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingKey("OPENAI_API_KEY"))?;

        Ok(Self {
            asr_api_key,
            tts_api_key,
        })
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("asr_api_key", &"***")
            .field("tts_api_key", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let config = Config::load("does-not-exist").unwrap();
        assert_eq!(config.service.name, "casecall");
        assert_eq!(config.service.http.port, 8080);
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.audio.encoding, "pcm_s16le");
        assert!(config.asr.format_turns);
        assert_eq!(config.asr.max_turn_silence, 3000);
    }
}
