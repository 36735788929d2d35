//! Validation for smaller config sections: presence.

use crate::schema::HuddleConfig;

use super::helpers::validate_range;

/// Validate presence constraints.
pub(crate) fn validate_presence(errors: &mut Vec<String>, config: &HuddleConfig) {
    let p = &config.presence;

    validate_range(
        errors,
        "presence.heartbeat_interval_ms",
        p.heartbeat_interval_ms,
        1_000,
        120_000,
    );
    validate_range(
        errors,
        "presence.stale_sweep_interval_ms",
        p.stale_sweep_interval_ms,
        1_000,
        300_000,
    );
    validate_range(
        errors,
        "presence.stale_threshold_ms",
        p.stale_threshold_ms,
        2_000,
        600_000,
    );
    validate_range(
        errors,
        "presence.speaking_rate_limit_ms",
        p.speaking_rate_limit_ms,
        0,
        5_000,
    );

    // A live client must refresh at least once before it can be swept.
    if p.stale_threshold_ms <= p.heartbeat_interval_ms {
        errors.push(format!(
            "presence.stale_threshold_ms = {} must exceed presence.heartbeat_interval_ms = {}",
            p.stale_threshold_ms, p.heartbeat_interval_ms
        ));
    }
}
