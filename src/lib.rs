pub mod audio;
pub mod config;
pub mod downstream;
pub mod error;
pub mod http;
pub mod lesson;
pub mod session;
pub mod stt;
pub mod tts;
pub mod ws;

pub use audio::{VadConfig, VoiceActivityDetector};
pub use config::{Config, Secrets};
pub use downstream::{TranscriptAnalyzer, UtteranceSink};
pub use http::{create_router, AppState};
pub use lesson::{GuideStep, LessonPlan};
pub use session::{
    BoundaryCause, SessionRecord, SessionRegistry, SessionSnapshot, SessionStatus, Supervisor,
};
pub use stt::{StreamingAsrClient, StreamingConfig, TranscriptEvent, TranscriptKind};
pub use ws::{ClientEvent, ClientSocket};
