use std::time::{Duration, Instant};

/// Silence must persist for this many consecutive ticker intervals
/// (~1.2 s total) before an utterance is considered finished.
pub const MAX_SILENCE_TICKS: u32 = 12;
/// How often the supervisor's silence ticker fires.
pub const SILENCE_CHECK_INTERVAL: Duration = Duration::from_millis(100);
/// Utterances shorter than this never end on silence.
pub const MIN_UTTERANCE: Duration = Duration::from_millis(500);
/// Hard cap on a single utterance.
pub const MAX_UTTERANCE: Duration = Duration::from_secs(30);

/// Why an utterance ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryCause {
    SustainedSilence,
    MaxDuration,
}

impl std::fmt::Display for BoundaryCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoundaryCause::SustainedSilence => write!(f, "sustained-silence"),
            BoundaryCause::MaxDuration => write!(f, "max-duration"),
        }
    }
}

/// Result of one silence-ticker pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SilenceTick {
    /// No utterance in progress, or still inside the minimum duration.
    Idle,
    /// Counting silence, boundary not yet reached.
    Waiting { silence: Duration, count: u32 },
    /// Sustained silence closed the utterance.
    Boundary { silence: Duration },
}

/// Utterance state shared by the socket reader and the silence ticker.
///
/// Voiced frames arrive on the reader; silence elapses on the ticker. Both
/// feed this tracker, which decides when an utterance opens and closes and
/// carries the reconnect-round bookkeeping that is scoped to one utterance.
pub struct UtteranceTracker {
    in_utterance: bool,
    utterance_start: Option<Instant>,
    last_voice: Option<Instant>,
    silence_count: u32,
    reconnect_attempts: u32,
}

impl UtteranceTracker {
    pub fn new() -> Self {
        Self {
            in_utterance: false,
            utterance_start: None,
            last_voice: None,
            silence_count: 0,
            reconnect_attempts: 0,
        }
    }

    pub fn in_utterance(&self) -> bool {
        self.in_utterance
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    /// Record a voiced frame that was forwarded to the ASR. Returns `true`
    /// when this frame opened a new utterance.
    pub fn note_voice(&mut self, now: Instant) -> bool {
        self.last_voice = Some(now);
        self.silence_count = 0;
        if self.in_utterance {
            return false;
        }
        self.in_utterance = true;
        self.utterance_start = Some(now);
        self.reconnect_attempts = 0;
        true
    }

    /// Enforce the hard utterance cap. Returns `true` exactly once per
    /// overlong utterance, flipping the state back to idle.
    pub fn check_max_duration(&mut self, now: Instant) -> bool {
        let Some(start) = self.utterance_start else {
            return false;
        };
        if self.in_utterance && now.duration_since(start) > MAX_UTTERANCE {
            self.in_utterance = false;
            return true;
        }
        false
    }

    /// One pass of the 100 ms silence ticker.
    pub fn tick(&mut self, now: Instant) -> SilenceTick {
        if !self.in_utterance {
            return SilenceTick::Idle;
        }
        let Some(start) = self.utterance_start else {
            return SilenceTick::Idle;
        };
        // Too-short utterances never end on silence.
        if now.duration_since(start) <= MIN_UTTERANCE {
            return SilenceTick::Idle;
        }

        let last_voice = self.last_voice.unwrap_or(start);
        let silence = now.duration_since(last_voice);
        if silence < SILENCE_CHECK_INTERVAL {
            return SilenceTick::Idle;
        }

        self.silence_count += 1;
        if self.silence_count >= MAX_SILENCE_TICKS {
            self.in_utterance = false;
            SilenceTick::Boundary { silence }
        } else {
            SilenceTick::Waiting {
                silence,
                count: self.silence_count,
            }
        }
    }

    /// Open a reconnect round and return its number (1-based).
    pub fn begin_reconnect_round(&mut self) -> u32 {
        self.reconnect_attempts += 1;
        self.reconnect_attempts
    }

    /// Voice flowed again after a recovery; further errors start counting
    /// from a clean slate.
    pub fn reset_reconnect(&mut self) {
        self.reconnect_attempts = 0;
    }
}

impl Default for UtteranceTracker {
    fn default() -> Self {
        Self::new()
    }
}
