//! Peer connection configuration types.

use serde::{Deserialize, Serialize};

/// One STUN/TURN server entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: &str) -> Self {
        Self {
            urls: vec![url.to_string()],
            username: None,
            credential: None,
        }
    }
}

/// Quality classification thresholds. A metric at or above the `fair_*`
/// bound classifies as poor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholdsConfig {
    pub excellent_rtt_ms: u32,
    pub good_rtt_ms: u32,
    pub fair_rtt_ms: u32,
    pub excellent_loss: f64,
    pub good_loss: f64,
    pub fair_loss: f64,
    pub excellent_jitter_ms: u32,
    pub good_jitter_ms: u32,
    pub fair_jitter_ms: u32,
}

impl Default for QualityThresholdsConfig {
    fn default() -> Self {
        Self {
            excellent_rtt_ms: 100,
            good_rtt_ms: 200,
            fair_rtt_ms: 400,
            excellent_loss: 0.01,
            good_loss: 0.03,
            fair_loss: 0.08,
            excellent_jitter_ms: 20,
            good_jitter_ms: 50,
            fair_jitter_ms: 100,
        }
    }
}

/// Peer connection and reconnection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub ice_servers: Vec<IceServerConfig>,
    /// Relays appended to `ice_servers` once a reconnect has been attempted.
    /// Empty disables the fallback.
    pub fallback_relays: Vec<IceServerConfig>,
    pub max_reconnect_attempts: u32,
    pub reconnect_base_delay_ms: u32,
    pub ice_disconnect_grace_ms: u32,
    pub stats_interval_ms: u32,
    pub quality: QualityThresholdsConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![
                IceServerConfig::stun("stun:stun.l.google.com:19302"),
                IceServerConfig::stun("stun:stun1.l.google.com:19302"),
            ],
            fallback_relays: vec![IceServerConfig {
                urls: vec!["turn:openrelay.metered.ca:80".into()],
                username: Some("openrelayproject".into()),
                credential: Some("openrelayproject".into()),
            }],
            max_reconnect_attempts: 3,
            reconnect_base_delay_ms: 2000,
            ice_disconnect_grace_ms: 2000,
            stats_interval_ms: 2000,
            quality: QualityThresholdsConfig::default(),
        }
    }
}
