//! Interview session management
//!
//! This module provides the per-session machinery:
//! - Session records and their lifecycle states
//! - The registry mapping session ids to records and admitting sockets
//! - The supervisor state machine driving VAD, ASR, and end-of-utterance
//!   detection
//! - Utterance tracking shared between the socket reader and silence ticker

mod record;
mod registry;
mod supervisor;
mod utterance;

pub use record::{CancelHandle, SessionInner, SessionRecord, SessionSnapshot, SessionStatus};
pub use registry::{Attachment, SessionRegistry};
pub use supervisor::{handle_transcript_event, Supervisor};
pub use utterance::{BoundaryCause, SilenceTick, UtteranceTracker};
