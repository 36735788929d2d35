//! Validation for the `[connection]` section.

use crate::schema::{HuddleConfig, IceServerConfig};

use super::helpers::{validate_ascending, validate_range, validate_range_f64};

const ICE_SCHEMES: [&str; 3] = ["stun:", "turn:", "turns:"];

fn validate_ice_server(errors: &mut Vec<String>, name: &str, server: &IceServerConfig) {
    if server.urls.is_empty() {
        errors.push(format!("{name} has no urls"));
    }
    for url in &server.urls {
        if !ICE_SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
            errors.push(format!("{name} url '{url}' must start with stun:, turn: or turns:"));
        }
    }
    let is_relay = server.urls.iter().any(|u| !u.starts_with("stun:"));
    if is_relay && (server.username.is_none() || server.credential.is_none()) {
        errors.push(format!("{name} is a relay and needs username and credential"));
    }
}

/// Validate ICE servers and reconnect timing.
pub(crate) fn validate_connection(errors: &mut Vec<String>, config: &HuddleConfig) {
    let c = &config.connection;

    if c.ice_servers.is_empty() {
        errors.push("connection.ice_servers must not be empty".into());
    }
    for (i, server) in c.ice_servers.iter().enumerate() {
        validate_ice_server(errors, &format!("connection.ice_servers[{i}]"), server);
    }
    for (i, server) in c.fallback_relays.iter().enumerate() {
        validate_ice_server(errors, &format!("connection.fallback_relays[{i}]"), server);
    }

    validate_range(
        errors,
        "connection.max_reconnect_attempts",
        c.max_reconnect_attempts,
        0,
        10,
    );
    validate_range(
        errors,
        "connection.reconnect_base_delay_ms",
        c.reconnect_base_delay_ms,
        100,
        60_000,
    );
    validate_range(
        errors,
        "connection.ice_disconnect_grace_ms",
        c.ice_disconnect_grace_ms,
        0,
        30_000,
    );
    validate_range(
        errors,
        "connection.stats_interval_ms",
        c.stats_interval_ms,
        250,
        60_000,
    );
}

/// Validate quality classification thresholds.
pub(crate) fn validate_quality(errors: &mut Vec<String>, config: &HuddleConfig) {
    let q = &config.connection.quality;

    validate_ascending(
        errors,
        "connection.quality rtt",
        q.excellent_rtt_ms,
        q.good_rtt_ms,
        q.fair_rtt_ms,
    );
    validate_ascending(
        errors,
        "connection.quality loss",
        q.excellent_loss,
        q.good_loss,
        q.fair_loss,
    );
    validate_ascending(
        errors,
        "connection.quality jitter",
        q.excellent_jitter_ms,
        q.good_jitter_ms,
        q.fair_jitter_ms,
    );
    validate_range_f64(errors, "connection.quality.fair_loss", q.fair_loss, 0.0, 1.0);
}
