//! Speaking detection types.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

/// Detector tuning.
#[derive(Debug, Clone)]
pub struct SpeakingConfig {
    /// RMS below this is treated as silence.
    pub noise_floor: f32,
    /// RMS that maps to a level of 1.0.
    pub level_ceiling: f32,
    /// Normalized level above which a frame counts as speech.
    pub threshold: f32,
    pub activation_delay: Duration,
    pub deactivation_delay: Duration,
    /// Upper bound on non-transition updates per second.
    pub max_update_hz: u32,
    pub fft_size: usize,
    pub smoothing: f64,
    pub frame_interval: Duration,
}

impl Default for SpeakingConfig {
    fn default() -> Self {
        Self {
            noise_floor: 0.005,
            level_ceiling: 0.2,
            threshold: 0.05,
            activation_delay: Duration::from_millis(150),
            deactivation_delay: Duration::from_millis(300),
            max_update_hz: 20,
            fft_size: 512,
            smoothing: 0.8,
            frame_interval: Duration::from_millis(16),
        }
    }
}

impl SpeakingConfig {
    pub fn min_emit_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.max_update_hz.max(1)))
    }
}

/// Current output of one detector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SpeakingState {
    pub is_speaking: bool,
    /// Normalized level in `0.0..=1.0`.
    pub level: f32,
    /// Unfloored RMS.
    pub raw_loudness: f32,
}

/// One report from a detector.
#[derive(Debug, Clone, Copy)]
pub struct SpeakingUpdate {
    pub state: SpeakingState,
    pub transition: bool,
    pub at: Instant,
}

/// Events published by the speaking aggregator.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeakerEvent {
    Level {
        participant_id: String,
        state: SpeakingState,
    },
    SpeakingChanged {
        participant_id: String,
        speaking: bool,
    },
    /// Sorted ids of everyone currently speaking.
    SpeakingSetChanged(Vec<String>),
    ActiveSpeakerChanged(Option<String>),
}
