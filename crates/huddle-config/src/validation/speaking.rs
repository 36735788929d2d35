//! Validation for the `[speaking]` section.

use crate::schema::HuddleConfig;

use super::helpers::{validate_range, validate_range_f64};

/// Validate speaking detector constraints.
pub(crate) fn validate_speaking(errors: &mut Vec<String>, config: &HuddleConfig) {
    let s = &config.speaking;

    validate_range_f64(errors, "speaking.noise_floor", s.noise_floor, 0.0, 0.5);
    validate_range_f64(errors, "speaking.level_ceiling", s.level_ceiling, 0.01, 1.0);
    validate_range_f64(errors, "speaking.threshold", s.threshold, 0.0, 1.0);
    validate_range_f64(errors, "speaking.smoothing", s.smoothing, 0.0, 1.0);
    validate_range(
        errors,
        "speaking.activation_delay_ms",
        s.activation_delay_ms,
        0,
        5_000,
    );
    validate_range(
        errors,
        "speaking.deactivation_delay_ms",
        s.deactivation_delay_ms,
        0,
        10_000,
    );
    validate_range(errors, "speaking.max_update_hz", s.max_update_hz, 1, 120);
    validate_range(
        errors,
        "speaking.frame_interval_ms",
        s.frame_interval_ms,
        5,
        200,
    );
    validate_range(errors, "speaking.fft_size", s.fft_size, 32, 32_768);
    if !s.fft_size.is_power_of_two() {
        errors.push(format!(
            "speaking.fft_size = {} must be a power of two",
            s.fft_size
        ));
    }
    if s.noise_floor >= s.level_ceiling {
        errors.push(format!(
            "speaking.noise_floor = {} must be below speaking.level_ceiling = {}",
            s.noise_floor, s.level_ceiling
        ));
    }
}
