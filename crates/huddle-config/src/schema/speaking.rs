//! Speaking detection configuration types.

use serde::{Deserialize, Serialize};

/// Speaking detector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeakingConfig {
    /// RMS below this (normalized amplitude) counts as silence.
    pub noise_floor: f64,
    /// RMS that maps to a level of 1.0.
    pub level_ceiling: f64,
    /// Normalized level at or above which a frame counts as voiced.
    pub threshold: f64,
    pub activation_delay_ms: u32,
    pub deactivation_delay_ms: u32,
    /// Upper bound on non-transition updates per second.
    pub max_update_hz: u32,
    /// Analysis window size in samples (power of two).
    pub fft_size: u32,
    pub smoothing: f64,
    /// Period of the analysis loop.
    pub frame_interval_ms: u32,
}

impl Default for SpeakingConfig {
    fn default() -> Self {
        Self {
            noise_floor: 0.005,
            level_ceiling: 0.2,
            threshold: 0.05,
            activation_delay_ms: 150,
            deactivation_delay_ms: 300,
            max_update_hz: 20,
            fft_size: 512,
            smoothing: 0.8,
            frame_interval_ms: 16,
        }
    }
}
