//! Audio analysis seam and loudness math.

use huddle_common::MediaError;

use crate::media::TrackHandle;

/// Read side of a host audio analyser attached to one track.
pub trait AudioAnalyser: Send {
    /// Copy the most recent time-domain window into `buf` as unsigned
    /// bytes, where 128 is silence.
    fn time_domain_bytes(&mut self, buf: &mut [u8]);
}

/// Host audio graph: attaches analysers to tracks.
pub trait AudioHost: Send + Sync {
    fn create_analyser(
        &self,
        track: &TrackHandle,
        fft_size: usize,
        smoothing: f64,
    ) -> Result<Box<dyn AudioAnalyser>, MediaError>;
}

/// Root-mean-square amplitude of an unsigned 8-bit window, in `0.0..=1.0`.
pub fn rms(window: &[u8]) -> f32 {
    if window.is_empty() {
        return 0.0;
    }
    let sum: f32 = window
        .iter()
        .map(|&b| {
            let sample = (f32::from(b) - 128.0) / 128.0;
            sample * sample
        })
        .sum();
    (sum / window.len() as f32).sqrt()
}

/// Map raw RMS to a UI level: zero below the noise floor, then linear up to
/// `ceiling`, clamped at 1.
pub fn normalize_level(rms: f32, noise_floor: f32, ceiling: f32) -> f32 {
    if rms < noise_floor || ceiling <= 0.0 {
        return 0.0;
    }
    (rms / ceiling).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_is_zero() {
        assert_eq!(rms(&[128; 512]), 0.0);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn square_wave_rms_matches_amplitude() {
        let window: Vec<u8> = (0..512)
            .map(|i| if i % 2 == 0 { 128 + 64 } else { 128 - 64 })
            .collect();
        assert!((rms(&window) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn level_respects_floor_and_ceiling() {
        assert_eq!(normalize_level(0.004, 0.005, 0.2), 0.0);
        assert!((normalize_level(0.1, 0.005, 0.2) - 0.5).abs() < 1e-6);
        assert_eq!(normalize_level(0.9, 0.005, 0.2), 1.0);
    }

    #[test]
    fn level_is_bounded_for_any_window() {
        for amplitude in [0u8, 1, 5, 20, 60, 127] {
            let window: Vec<u8> = (0..256)
                .map(|i| if i % 2 == 0 { 128 + amplitude } else { 128 - amplitude })
                .collect();
            let level = normalize_level(rms(&window), 0.005, 0.2);
            assert!((0.0..=1.0).contains(&level));
        }
    }
}
