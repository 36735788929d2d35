//! Peer connection management: one transport per remote participant, with
//! reconnection, ICE-restart recovery, and link quality monitoring.

mod manager;
mod quality;
mod transport;
mod types;

pub use manager::ConnectionManager;
pub use quality::{
    ConnectionQuality, QualitySampler, QualitySnapshot, QualityThresholds, StatsReport,
};
pub use transport::{
    IceCandidate, IceConnectionState, IceServer, PeerTransport, RtcConfiguration, SdpType,
    SenderId, SessionDescription, TransportEvent, TransportFactory, TransportState,
};
pub use types::{ConnectionConfig, ConnectionEvent, ConnectionState};
