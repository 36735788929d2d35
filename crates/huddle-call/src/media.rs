//! Media track handles, streams, and capture constraints.
//!
//! Tracks are owned by the host media stack; the engine only holds
//! reference-counted handles and flips their enabled/stopped flags.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use huddle_common::MediaError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// A live audio or video track provided by the host.
pub trait MediaTrack: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;
    fn kind(&self) -> MediaKind;
    fn is_enabled(&self) -> bool;
    fn set_enabled(&self, enabled: bool);
    /// Release the capture device. Stopped tracks never produce media again.
    fn stop(&self);
}

pub type TrackHandle = Arc<dyn MediaTrack>;

/// A group of tracks that belong to one participant.
#[derive(Debug, Clone)]
pub struct MediaStream {
    id: String,
    tracks: Vec<TrackHandle>,
}

impl MediaStream {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tracks: Vec::new(),
        }
    }

    pub fn with_track(mut self, track: TrackHandle) -> Self {
        self.add_track(track);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Add a track, replacing any existing track with the same id.
    pub fn add_track(&mut self, track: TrackHandle) {
        self.tracks.retain(|t| t.id() != track.id());
        self.tracks.push(track);
    }

    pub fn tracks(&self) -> &[TrackHandle] {
        &self.tracks
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &TrackHandle> {
        self.tracks.iter().filter(|t| t.kind() == MediaKind::Audio)
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &TrackHandle> {
        self.tracks.iter().filter(|t| t.kind() == MediaKind::Video)
    }

    pub fn has_audio(&self) -> bool {
        self.audio_tracks().next().is_some()
    }
}

// ---------------------------------------------------------------------------
// Constraints
// ---------------------------------------------------------------------------

/// Microphone capture constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    pub sample_rate: u32,
    pub channel_count: u16,
}

impl AudioConstraints {
    /// Voice profile used for every call: 48kHz mono with all processing on.
    pub const VOICE: Self = Self {
        echo_cancellation: true,
        noise_suppression: true,
        auto_gain_control: true,
        sample_rate: 48_000,
        channel_count: 1,
    };
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self::VOICE
    }
}

/// Camera capture constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoConstraints {
    pub width: u32,
    pub height: u32,
    pub min_frame_rate: u32,
    pub max_frame_rate: u32,
}

impl VideoConstraints {
    pub const HD: Self = Self {
        width: 1280,
        height: 720,
        min_frame_rate: 30,
        max_frame_rate: 30,
    };

    pub const SD: Self = Self {
        width: 854,
        height: 480,
        min_frame_rate: 24,
        max_frame_rate: 30,
    };
}

/// Profiles tried in order when acquiring a camera track.
pub const VIDEO_PROFILES: [VideoConstraints; 2] = [VideoConstraints::HD, VideoConstraints::SD];

/// Host capture devices.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn acquire_audio(&self, constraints: &AudioConstraints)
        -> Result<TrackHandle, MediaError>;

    async fn acquire_video(&self, constraints: &VideoConstraints)
        -> Result<TrackHandle, MediaError>;
}
