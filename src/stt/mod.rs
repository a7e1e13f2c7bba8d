//! Streaming speech-to-text client.
//!
//! Maintains a bidirectional WebSocket session with the transcription
//! provider: audio frames out, typed transcript events in. Transport loss is
//! surfaced on the error channel; recovery policy belongs to the session
//! supervisor.

mod client;
pub mod messages;

pub use client::StreamingAsrClient;
pub use messages::{StreamingConfig, TranscriptEvent, TranscriptKind};
