//! Presence document and configuration types.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle flag stored on each presence document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    #[default]
    Active,
    Left,
}

/// One participant's presence document, keyed by `uid` inside a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantPresence {
    pub uid: String,
    pub display_name: String,
    #[serde(rename = "photoURL", default)]
    pub photo_url: Option<String>,
    pub muted: bool,
    pub deafened: bool,
    pub video_enabled: bool,
    pub screen_sharing: bool,
    pub speaking: bool,
    pub joined_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    pub status: PresenceStatus,
}

impl ParticipantPresence {
    pub fn new(
        uid: impl Into<String>,
        profile: &PresenceProfile,
        media: MediaState,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            uid: uid.into(),
            display_name: profile.display_name.clone(),
            photo_url: profile.photo_url.clone(),
            muted: media.muted,
            deafened: media.deafened,
            video_enabled: media.video_enabled,
            screen_sharing: media.screen_sharing,
            speaking: false,
            joined_at: now,
            last_heartbeat: now,
            status: PresenceStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == PresenceStatus::Active
    }
}

/// Identity shown to other participants.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PresenceProfile {
    pub display_name: String,
    pub photo_url: Option<String>,
}

impl PresenceProfile {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            photo_url: None,
        }
    }
}

/// Media flags written at join time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MediaState {
    pub muted: bool,
    pub deafened: bool,
    pub video_enabled: bool,
    pub screen_sharing: bool,
}

/// Partial update merged into an existing document. `None` fields are left
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresencePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deafened: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen_sharing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaking: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_heartbeat: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PresenceStatus>,
}

impl PresencePatch {
    pub fn heartbeat(now: DateTime<Utc>) -> Self {
        Self {
            last_heartbeat: Some(now),
            ..Self::default()
        }
    }

    /// Marks a participant as departed without touching its heartbeat.
    pub fn left() -> Self {
        Self {
            status: Some(PresenceStatus::Left),
            ..Self::default()
        }
    }

    pub fn with_heartbeat(mut self, now: DateTime<Utc>) -> Self {
        self.last_heartbeat = Some(now);
        self
    }

    pub fn apply_to(&self, doc: &mut ParticipantPresence) {
        if let Some(v) = self.muted {
            doc.muted = v;
        }
        if let Some(v) = self.deafened {
            doc.deafened = v;
        }
        if let Some(v) = self.video_enabled {
            doc.video_enabled = v;
        }
        if let Some(v) = self.screen_sharing {
            doc.screen_sharing = v;
        }
        if let Some(v) = self.speaking {
            doc.speaking = v;
        }
        if let Some(v) = self.last_heartbeat {
            doc.last_heartbeat = v;
        }
        if let Some(v) = self.status {
            doc.status = v;
        }
    }
}

/// Presence timing.
#[derive(Debug, Clone)]
pub struct PresenceConfig {
    pub heartbeat_interval: Duration,
    pub stale_sweep_interval: Duration,
    /// Records whose heartbeat is older than this are flipped to `left`.
    pub stale_threshold: Duration,
    /// Window over which speaking-flag writes are coalesced.
    pub speaking_rate_limit: Duration,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(10_000),
            stale_sweep_interval: Duration::from_millis(15_000),
            stale_threshold: Duration::from_millis(30_000),
            speaking_rate_limit: Duration::from_millis(200),
        }
    }
}

/// Events emitted by [`PresenceSync`](super::PresenceSync).
#[derive(Debug, Clone, PartialEq)]
pub enum PresenceEvent {
    Joined(ParticipantPresence),
    Updated(ParticipantPresence),
    Left { uid: String, display_name: String },
    /// Full active participant list after a batch of changes.
    ParticipantsChanged(Vec<ParticipantPresence>),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> ParticipantPresence {
        ParticipantPresence::new(
            "u1",
            &PresenceProfile {
                display_name: "Ada".into(),
                photo_url: Some("https://example.com/ada.png".into()),
            },
            MediaState {
                muted: true,
                ..MediaState::default()
            },
            Utc::now(),
        )
    }

    #[test]
    fn document_uses_wire_field_names() {
        let json = serde_json::to_value(doc()).unwrap();
        assert_eq!(json["displayName"], "Ada");
        assert_eq!(json["photoURL"], "https://example.com/ada.png");
        assert_eq!(json["videoEnabled"], false);
        assert_eq!(json["status"], "active");
        assert!(json.get("lastHeartbeat").is_some());
    }

    #[test]
    fn document_round_trips() {
        let original = doc();
        let text = serde_json::to_string(&original).unwrap();
        let back: ParticipantPresence = serde_json::from_str(&text).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn patch_serializes_only_set_fields() {
        let patch = PresencePatch {
            speaking: Some(true),
            ..PresencePatch::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "speaking": true }));
    }

    #[test]
    fn patch_applies_only_set_fields() {
        let mut d = doc();
        let joined = d.joined_at;
        PresencePatch::left().apply_to(&mut d);
        assert_eq!(d.status, PresenceStatus::Left);
        assert!(d.muted);
        assert_eq!(d.last_heartbeat, joined);
    }
}
