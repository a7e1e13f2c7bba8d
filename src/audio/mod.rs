pub mod vad;

pub use vad::{VadConfig, VoiceActivityDetector};
