//! Thin text-to-speech client for the interviewer voice.

use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Duration;

const SPEECH_ENDPOINT: &str = "https://api.openai.com/v1/audio/speech";
const DEFAULT_MODEL: &str = "tts-1";
const DEFAULT_VOICE: &str = "alloy";

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
}

pub struct TtsClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    voice: String,
}

impl TtsClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build TTS HTTP client")?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
        })
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    fn request_body<'a>(&'a self, text: &'a str) -> SpeechRequest<'a> {
        SpeechRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
        }
    }

    /// Synthesize one piece of interviewer text to audio bytes.
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(SPEECH_ENDPOINT)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.request_body(text))
            .send()
            .await
            .context("TTS request failed")?
            .error_for_status()
            .context("TTS request rejected")?;

        let audio = response
            .bytes()
            .await
            .context("Failed to read TTS audio")?;

        Ok(audio.to_vec())
    }
}
