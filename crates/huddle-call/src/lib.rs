//! Real-time call session engine: peer connection lifecycle, local speaking
//! detection, and shared call presence.
//!
//! The media runtime, audio graph, and presence backend are injected through
//! the traits in [`media`], [`connection`], [`speaking`], and [`presence`].

pub mod connection;
pub mod media;
mod periodic;
pub mod presence;
pub mod speaking;

#[cfg(test)]
mod testing;

pub use connection::{
    ConnectionConfig, ConnectionEvent, ConnectionManager, ConnectionQuality, ConnectionState,
    PeerTransport, QualitySnapshot, TransportFactory,
};
pub use media::{MediaDevices, MediaKind, MediaStream, MediaTrack, TrackHandle};
pub use presence::{
    MediaState, MemoryPresenceStore, ParticipantPresence, PresenceConfig, PresenceEvent,
    PresenceProfile, PresenceStore, PresenceSync,
};
pub use speaking::{
    AudioHost, SpeakerEvent, SpeakingAggregator, SpeakingConfig, SpeakingDetector, SpeakingState,
};
