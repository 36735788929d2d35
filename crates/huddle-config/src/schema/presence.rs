//! Presence synchronization configuration types.

use serde::{Deserialize, Serialize};

/// Presence heartbeat, sweep, and write-throttling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    pub heartbeat_interval_ms: u32,
    pub stale_sweep_interval_ms: u32,
    /// A record whose heartbeat is older than this is considered abandoned.
    pub stale_threshold_ms: u32,
    pub speaking_rate_limit_ms: u32,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 10_000,
            stale_sweep_interval_ms: 15_000,
            stale_threshold_ms: 30_000,
            speaking_rate_limit_ms: 200,
        }
    }
}
