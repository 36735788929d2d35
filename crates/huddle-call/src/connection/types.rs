//! Connection manager state, configuration, and events.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use super::quality::{QualitySnapshot, QualityThresholds};
use super::transport::{IceCandidate, IceServer, RtcConfiguration, SessionDescription};
use crate::media::MediaStream;

/// Lifecycle of one peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Connection manager configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub ice_servers: Vec<IceServer>,
    /// Appended to `ice_servers` once a reconnect has been attempted.
    pub fallback_relays: Vec<IceServer>,
    pub max_reconnect_attempts: u32,
    /// Attempt `n` waits `reconnect_base_delay * n`.
    pub reconnect_base_delay: Duration,
    /// How long an ICE disconnect may last before it counts as a failure.
    pub ice_disconnect_grace: Duration,
    pub stats_interval: Duration,
    pub thresholds: QualityThresholds,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![
                IceServer::stun("stun:stun.l.google.com:19302"),
                IceServer::stun("stun:stun1.l.google.com:19302"),
            ],
            fallback_relays: vec![IceServer {
                urls: vec!["turn:openrelay.metered.ca:80".into()],
                username: Some("openrelayproject".into()),
                credential: Some("openrelayproject".into()),
            }],
            max_reconnect_attempts: 3,
            reconnect_base_delay: Duration::from_millis(2000),
            ice_disconnect_grace: Duration::from_millis(2000),
            stats_interval: Duration::from_millis(2000),
            thresholds: QualityThresholds::default(),
        }
    }
}

impl ConnectionConfig {
    pub(crate) fn rtc_configuration(&self, with_relays: bool) -> RtcConfiguration {
        let mut ice_servers = self.ice_servers.clone();
        if with_relays {
            ice_servers.extend(self.fallback_relays.iter().cloned());
        }
        RtcConfiguration { ice_servers }
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        self.reconnect_base_delay.saturating_mul(attempt)
    }
}

/// Events emitted by a [`ConnectionManager`](super::ConnectionManager).
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    StateChanged {
        peer: String,
        state: ConnectionState,
    },
    QualityChanged {
        peer: String,
        snapshot: QualitySnapshot,
    },
    /// A local ICE candidate to forward over signaling.
    LocalCandidate {
        peer: String,
        candidate: IceCandidate,
    },
    /// An ICE-restart offer produced by a reconnect attempt, to forward over
    /// signaling.
    RestartOffer {
        peer: String,
        offer: SessionDescription,
    },
    RemoteStream {
        peer: String,
        stream: MediaStream,
    },
    Error {
        peer: String,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relays_only_when_requested() {
        let config = ConnectionConfig::default();
        assert_eq!(config.rtc_configuration(false).ice_servers.len(), 2);
        let with = config.rtc_configuration(true);
        assert_eq!(with.ice_servers.len(), 3);
        assert!(with.ice_servers[2].is_relay());
    }

    #[test]
    fn backoff_is_linear() {
        let config = ConnectionConfig::default();
        assert_eq!(config.backoff(1), Duration::from_millis(2000));
        assert_eq!(config.backoff(2), Duration::from_millis(4000));
        assert_eq!(config.backoff(3), Duration::from_millis(6000));
    }

    #[test]
    fn state_display() {
        assert_eq!(ConnectionState::Reconnecting.to_string(), "reconnecting");
        assert_eq!(ConnectionState::Idle.to_string(), "idle");
    }
}
