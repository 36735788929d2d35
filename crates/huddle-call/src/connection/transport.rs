//! The peer transport seam: a WebRTC-style peer connection provided by the host.

use std::sync::Arc;

use async_trait::async_trait;
use huddle_common::TransportError;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::quality::StatsReport;
use crate::media::TrackHandle;

/// One STUN/TURN server entry handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    pub fn stun(url: &str) -> Self {
        Self {
            urls: vec![url.to_string()],
            username: None,
            credential: None,
        }
    }

    pub fn is_relay(&self) -> bool {
        self.urls
            .iter()
            .any(|u| u.starts_with("turn:") || u.starts_with("turns:"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RtcConfiguration {
    pub ice_servers: Vec<IceServer>,
}

/// Overall transport state as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// ICE agent state as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default, rename = "sdpMLineIndex")]
    pub sdp_mline_index: Option<u16>,
}

/// Opaque handle to an outgoing track slot on the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SenderId(pub u32);

/// Notifications the transport pushes to its owner.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    StateChanged(TransportState),
    IceStateChanged(IceConnectionState),
    LocalCandidate(IceCandidate),
    RemoteTrack { track: TrackHandle, stream_id: String },
}

/// A single peer connection.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn add_track(&self, track: TrackHandle) -> Result<SenderId, TransportError>;

    /// Swap the track carried by `sender` without renegotiation.
    async fn replace_track(
        &self,
        sender: SenderId,
        track: Option<TrackHandle>,
    ) -> Result<(), TransportError>;

    async fn create_offer(&self, ice_restart: bool) -> Result<SessionDescription, TransportError>;

    async fn create_answer(&self) -> Result<SessionDescription, TransportError>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), TransportError>;

    async fn set_remote_description(&self, desc: SessionDescription)
        -> Result<(), TransportError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError>;

    fn set_configuration(&self, config: &RtcConfiguration) -> Result<(), TransportError>;

    async fn get_stats(&self) -> Result<Vec<StatsReport>, TransportError>;

    async fn close(&self);
}

/// Creates transports. Events for the new transport flow through `events`
/// until it is closed or the receiver is dropped.
pub trait TransportFactory: Send + Sync {
    fn create(
        &self,
        config: &RtcConfiguration,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>, TransportError>;
}
