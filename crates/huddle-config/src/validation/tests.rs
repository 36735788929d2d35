//! Tests for the full validation pipeline.

use super::*;
use crate::schema::*;

#[test]
fn default_config_validates() {
    let config = HuddleConfig::default();
    assert!(validate(&config).is_ok());
}

#[test]
fn catches_empty_ice_servers() {
    let mut config = HuddleConfig::default();
    config.connection.ice_servers.clear();
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("connection.ice_servers must not be empty"));
}

#[test]
fn catches_bad_ice_scheme() {
    let mut config = HuddleConfig::default();
    config.connection.ice_servers[0].urls[0] = "http://stun.example.org".into();
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("connection.ice_servers[0]"));
}

#[test]
fn catches_relay_without_credentials() {
    let mut config = HuddleConfig::default();
    config.connection.fallback_relays[0].credential = None;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("connection.fallback_relays[0] is a relay"));
}

#[test]
fn empty_fallback_relays_is_valid() {
    let mut config = HuddleConfig::default();
    config.connection.fallback_relays.clear();
    assert!(validate(&config).is_ok());
}

#[test]
fn catches_too_many_reconnect_attempts() {
    let mut config = HuddleConfig::default();
    config.connection.max_reconnect_attempts = 50;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("connection.max_reconnect_attempts"));
}

#[test]
fn zero_reconnect_attempts_is_valid() {
    let mut config = HuddleConfig::default();
    config.connection.max_reconnect_attempts = 0;
    assert!(validate(&config).is_ok());
}

#[test]
fn catches_stats_interval_too_short() {
    let mut config = HuddleConfig::default();
    config.connection.stats_interval_ms = 10;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("connection.stats_interval_ms"));
}

#[test]
fn catches_unordered_rtt_thresholds() {
    let mut config = HuddleConfig::default();
    config.connection.quality.good_rtt_ms = 500;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("connection.quality rtt"));
}

#[test]
fn catches_unordered_loss_thresholds() {
    let mut config = HuddleConfig::default();
    config.connection.quality.excellent_loss = 0.05;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("connection.quality loss"));
}

#[test]
fn catches_fft_size_not_power_of_two() {
    let mut config = HuddleConfig::default();
    config.speaking.fft_size = 500;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("power of two"));
}

#[test]
fn catches_noise_floor_above_ceiling() {
    let mut config = HuddleConfig::default();
    config.speaking.noise_floor = 0.3;
    config.speaking.level_ceiling = 0.2;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("must be below speaking.level_ceiling"));
}

#[test]
fn catches_zero_update_rate() {
    let mut config = HuddleConfig::default();
    config.speaking.max_update_hz = 0;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("speaking.max_update_hz"));
}

#[test]
fn catches_stale_threshold_below_heartbeat() {
    let mut config = HuddleConfig::default();
    config.presence.heartbeat_interval_ms = 20_000;
    config.presence.stale_threshold_ms = 15_000;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("must exceed presence.heartbeat_interval_ms"));
}

#[test]
fn collects_multiple_errors() {
    let mut config = HuddleConfig::default();
    config.speaking.smoothing = 2.0;
    config.presence.speaking_rate_limit_ms = 10_000;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("speaking.smoothing"));
    assert!(err.contains("presence.speaking_rate_limit_ms"));
}
