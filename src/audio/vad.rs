use tracing::debug;

use crate::error::VadError;

/// Tuning for the energy-based voice activity detector.
#[derive(Debug, Clone)]
pub struct VadConfig {
    /// RMS energy above which a single frame counts as voiced.
    pub energy_threshold: f64,
    /// Consecutive smoothed-voice frames required to confirm speech.
    pub min_voice_frames: u32,
    /// Consecutive smoothed-silence frames required to confirm silence.
    pub min_silence_frames: u32,
    /// Size of the majority-vote smoothing window.
    pub window_size: usize,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 1000.0,
            min_voice_frames: 3,
            min_silence_frames: 5,
            window_size: 5,
        }
    }
}

/// Voice activity detector over 16-bit little-endian PCM frames.
///
/// A raw per-frame energy decision is smoothed through a fixed circular
/// window (majority vote), then run through voice/silence hysteresis so a
/// single loud frame cannot open an utterance and a single quiet frame
/// cannot close one.
pub struct VoiceActivityDetector {
    config: VadConfig,
    window: Vec<bool>,
    window_index: usize,
    voice_run: u32,
    silence_run: u32,
}

impl VoiceActivityDetector {
    pub fn new(config: VadConfig) -> Self {
        let window = vec![false; config.window_size.max(1)];
        Self {
            config,
            window,
            window_index: 0,
            voice_run: 0,
            silence_run: 0,
        }
    }

    /// Decide whether speech is present in one PCM frame.
    ///
    /// Frames shorter than one sample are rejected with `InvalidFrame`;
    /// a trailing odd byte is ignored.
    pub fn detect(&mut self, frame: &[u8]) -> Result<bool, VadError> {
        if frame.len() < 2 {
            return Err(VadError::InvalidFrame(frame.len()));
        }

        let energy = Self::rms_energy(frame);
        let has_voice = energy > self.config.energy_threshold;

        self.window[self.window_index] = has_voice;
        self.window_index = (self.window_index + 1) % self.window.len();

        let voiced_count = self.window.iter().filter(|&&v| v).count();
        let smoothed = voiced_count > self.window.len() / 2;

        if smoothed {
            self.voice_run += 1;
            self.silence_run = 0;
            let confirmed = self.voice_run >= self.config.min_voice_frames;
            if confirmed && self.voice_run == self.config.min_voice_frames {
                debug!("VAD: speech confirmed (rms {:.1})", energy);
            }
            Ok(confirmed)
        } else {
            self.silence_run += 1;
            self.voice_run = 0;
            // Hold the voiced decision until silence is confirmed.
            Ok(self.silence_run < self.config.min_silence_frames)
        }
    }

    /// RMS energy of a frame of signed 16-bit little-endian samples.
    fn rms_energy(frame: &[u8]) -> f64 {
        let mut sum = 0.0f64;
        let mut count = 0usize;
        for chunk in frame.chunks_exact(2) {
            let sample = i16::from_le_bytes([chunk[0], chunk[1]]) as f64;
            sum += sample * sample;
            count += 1;
        }
        if count == 0 {
            return 0.0;
        }
        (sum / count as f64).sqrt()
    }

    /// Clear the hysteresis counters, keeping the smoothing window.
    pub fn reset(&mut self) {
        self.voice_run = 0;
        self.silence_run = 0;
    }
}

impl Default for VoiceActivityDetector {
    fn default() -> Self {
        Self::new(VadConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A 100ms frame of loud tone at 16kHz, well above the energy threshold.
    fn tone_frame() -> Vec<u8> {
        (0..1600)
            .map(|i| ((i as f32 * 0.1).sin() * 10000.0) as i16)
            .flat_map(|s| s.to_le_bytes())
            .collect()
    }

    fn silence_frame() -> Vec<u8> {
        vec![0u8; 3200]
    }

    #[test]
    fn test_rejects_short_frame() {
        let mut vad = VoiceActivityDetector::default();
        assert!(matches!(vad.detect(&[0u8]), Err(VadError::InvalidFrame(1))));
        assert!(matches!(vad.detect(&[]), Err(VadError::InvalidFrame(0))));
    }

    #[test]
    fn test_silence_stays_silent() {
        let mut vad = VoiceActivityDetector::default();
        for _ in 0..20 {
            // After min_silence_frames of confirmed silence the hold expires.
            let _ = vad.detect(&silence_frame()).unwrap();
        }
        assert!(!vad.detect(&silence_frame()).unwrap());
    }

    #[test]
    fn test_speech_confirmed_after_voice_run() {
        let mut vad = VoiceActivityDetector::default();
        let frame = tone_frame();

        // Window majority flips on frame 3, then the hysteresis needs 3
        // consecutive smoothed-voice frames: confirmation lands on frame 5.
        // Frames 1-2 are still inside the unconfirmed-silence hold.
        let decisions: Vec<bool> = (0..6).map(|_| vad.detect(&frame).unwrap()).collect();
        assert_eq!(decisions, vec![true, true, false, false, true, true]);

        // Once open, the run counter has seen at least min_voice_frames.
        assert!(vad.detect(&frame).unwrap());
    }

    #[test]
    fn test_single_quiet_frame_does_not_close() {
        let mut vad = VoiceActivityDetector::default();
        let voice = tone_frame();
        let quiet = silence_frame();

        for _ in 0..6 {
            vad.detect(&voice).unwrap();
        }
        // One quiet frame leaves the window majority voiced.
        assert!(vad.detect(&quiet).unwrap());
        assert!(vad.detect(&voice).unwrap());
    }

    #[test]
    fn test_sustained_silence_closes() {
        let mut vad = VoiceActivityDetector::default();
        let voice = tone_frame();
        let quiet = silence_frame();

        for _ in 0..6 {
            vad.detect(&voice).unwrap();
        }
        let mut last = true;
        for _ in 0..10 {
            last = vad.detect(&quiet).unwrap();
        }
        assert!(!last);
    }

    #[test]
    fn test_reset_clears_runs_but_keeps_window() {
        let mut vad = VoiceActivityDetector::default();
        let voice = tone_frame();
        for _ in 0..6 {
            vad.detect(&voice).unwrap();
        }

        vad.reset();

        // The window is still majority-voiced, so the very first frames
        // after reset count toward a fresh voice run.
        assert!(!vad.detect(&voice).unwrap());
        assert!(!vad.detect(&voice).unwrap());
        assert!(vad.detect(&voice).unwrap());
    }

    #[test]
    fn test_odd_byte_length_tolerated() {
        let mut vad = VoiceActivityDetector::default();
        let mut frame = tone_frame();
        frame.push(0x7f);
        assert!(vad.detect(&frame).is_ok());
    }
}
