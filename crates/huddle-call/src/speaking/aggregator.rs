//! Combines per-participant detectors into a speaking set and an active speaker.

use std::collections::HashMap;
use std::sync::Arc;

use huddle_common::EventBus;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::media::MediaStream;

use super::analysis::AudioHost;
use super::detector::SpeakingDetector;
use super::types::{SpeakerEvent, SpeakingConfig, SpeakingState};

// ---------------------------------------------------------------------------
// Speaker board
// ---------------------------------------------------------------------------

/// What changed after a board update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoardChange {
    pub speaking_set: bool,
    pub active_speaker: bool,
}

/// Tracks who is speaking and since when. The active speaker is whoever
/// most recently started speaking; ties go to the larger id.
#[derive(Debug, Default, Clone)]
pub struct SpeakerBoard {
    speaking_since: HashMap<String, Instant>,
    active: Option<String>,
}

impl SpeakerBoard {
    pub fn set_speaking(&mut self, participant_id: &str, speaking: bool, at: Instant) -> BoardChange {
        let speaking_set = if speaking {
            if self.speaking_since.contains_key(participant_id) {
                false
            } else {
                self.speaking_since.insert(participant_id.to_string(), at);
                true
            }
        } else {
            self.speaking_since.remove(participant_id).is_some()
        };
        BoardChange {
            speaking_set,
            active_speaker: self.recompute_active(),
        }
    }

    pub fn remove(&mut self, participant_id: &str) -> BoardChange {
        self.set_speaking(participant_id, false, Instant::now())
    }

    pub fn clear(&mut self) -> BoardChange {
        let speaking_set = !self.speaking_since.is_empty();
        self.speaking_since.clear();
        BoardChange {
            speaking_set,
            active_speaker: self.recompute_active(),
        }
    }

    pub fn speaking(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.speaking_since.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_speaking(&self, participant_id: &str) -> bool {
        self.speaking_since.contains_key(participant_id)
    }

    pub fn active_speaker(&self) -> Option<&str> {
        self.active.as_deref()
    }

    fn recompute_active(&mut self) -> bool {
        let next = self
            .speaking_since
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)))
            .map(|(id, _)| id.clone());
        if next == self.active {
            return false;
        }
        self.active = next;
        true
    }
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

struct Monitored {
    detector: SpeakingDetector,
    forwarder: JoinHandle<()>,
}

/// Runs one detector per participant and publishes [`SpeakerEvent`]s.
pub struct SpeakingAggregator {
    config: SpeakingConfig,
    host: Arc<dyn AudioHost>,
    board: Arc<RwLock<SpeakerBoard>>,
    levels: Arc<RwLock<HashMap<String, SpeakingState>>>,
    monitored: Mutex<HashMap<String, Monitored>>,
    bus: EventBus<SpeakerEvent>,
}

impl SpeakingAggregator {
    pub fn new(config: SpeakingConfig, host: Arc<dyn AudioHost>) -> Self {
        Self {
            config,
            host,
            board: Arc::new(RwLock::new(SpeakerBoard::default())),
            levels: Arc::new(RwLock::new(HashMap::new())),
            monitored: Mutex::new(HashMap::new()),
            bus: EventBus::new(256),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SpeakerEvent> {
        self.bus.subscribe()
    }

    /// Monitor `stream` for `participant_id`, replacing any existing
    /// monitoring for that participant.
    pub async fn add_participant(&self, participant_id: &str, stream: &MediaStream) -> bool {
        self.remove_participant(participant_id).await;

        let (detector, mut updates) = SpeakingDetector::new(self.config.clone(), self.host.clone());
        if !detector.start(stream).await {
            return false;
        }

        let id = participant_id.to_string();
        let board = self.board.clone();
        let levels = self.levels.clone();
        let bus = self.bus.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(update) = updates.recv().await {
                levels.write().await.insert(id.clone(), update.state);
                bus.publish(SpeakerEvent::Level {
                    participant_id: id.clone(),
                    state: update.state,
                });
                if update.transition {
                    let change = board
                        .write()
                        .await
                        .set_speaking(&id, update.state.is_speaking, update.at);
                    bus.publish(SpeakerEvent::SpeakingChanged {
                        participant_id: id.clone(),
                        speaking: update.state.is_speaking,
                    });
                    publish_change(&bus, &board, change).await;
                }
            }
        });

        self.monitored
            .lock()
            .await
            .insert(participant_id.to_string(), Monitored { detector, forwarder });
        info!(participant_id, "monitoring participant audio");
        true
    }

    pub async fn remove_participant(&self, participant_id: &str) {
        let Some(entry) = self.monitored.lock().await.remove(participant_id) else {
            return;
        };
        // Stop forwarding first so the detector's final update is not replayed.
        entry.forwarder.abort();
        entry.detector.stop().await;
        self.levels.write().await.remove(participant_id);

        let change = self.board.write().await.remove(participant_id);
        if change.speaking_set {
            self.bus.publish(SpeakerEvent::SpeakingChanged {
                participant_id: participant_id.to_string(),
                speaking: false,
            });
        }
        publish_change(&self.bus, &self.board, change).await;
        debug!(participant_id, "stopped monitoring participant audio");
    }

    /// Stop every detector.
    pub async fn clear(&self) {
        let entries: Vec<Monitored> = self.monitored.lock().await.drain().map(|(_, m)| m).collect();
        for entry in entries {
            entry.forwarder.abort();
            entry.detector.stop().await;
        }
        self.levels.write().await.clear();
        let change = self.board.write().await.clear();
        publish_change(&self.bus, &self.board, change).await;
    }

    pub async fn speaking_participants(&self) -> Vec<String> {
        self.board.read().await.speaking()
    }

    pub async fn active_speaker(&self) -> Option<String> {
        self.board.read().await.active_speaker().map(str::to_string)
    }

    pub async fn state_of(&self, participant_id: &str) -> Option<SpeakingState> {
        self.levels.read().await.get(participant_id).copied()
    }

    pub async fn monitored_count(&self) -> usize {
        self.monitored.lock().await.len()
    }
}

async fn publish_change(
    bus: &EventBus<SpeakerEvent>,
    board: &RwLock<SpeakerBoard>,
    change: BoardChange,
) {
    if !change.speaking_set && !change.active_speaker {
        return;
    }
    let board = board.read().await;
    if change.speaking_set {
        bus.publish(SpeakerEvent::SpeakingSetChanged(board.speaking()));
    }
    if change.active_speaker {
        bus.publish(SpeakerEvent::ActiveSpeakerChanged(
            board.active_speaker().map(str::to_string),
        ));
    }
}
