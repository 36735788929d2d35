//! In-process call simulation.
//!
//! Several participants join one call on a shared memory store. Each one
//! gets a synthetic microphone that takes turns talking, the speaking
//! aggregator picks the active speaker, and speaking flags are written back
//! to presence. A crashed participant left over from an earlier session is
//! seeded into the call so the stale sweep has something to clean up.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use huddle_call::media::{MediaKind, MediaStream, MediaTrack, TrackHandle};
use huddle_call::presence::{
    MediaState, MemoryPresenceStore, ParticipantPresence, PresenceConfig, PresenceEvent,
    PresenceProfile, PresenceStore, PresenceSync,
};
use huddle_call::speaking::{
    AudioAnalyser, AudioHost, SpeakerEvent, SpeakingAggregator, SpeakingConfig,
};
use huddle_common::{CallKey, HuddleError, MediaError, StoreError};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

const NAMES: [&str; 6] = ["Ada", "Grace", "Linus", "Margaret", "Ken", "Barbara"];

/// How long each participant holds the floor.
const TURN: Duration = Duration::from_secs(3);

/// Square-wave amplitude around the 128 midpoint while talking.
const VOICE_AMPLITUDE: u8 = 24;

pub struct SimulationOptions {
    pub participants: usize,
    pub duration: Duration,
    pub call: CallKey,
    pub speaking: SpeakingConfig,
    pub presence: PresenceConfig,
}

// ---------------------------------------------------------------------------
// Synthetic media
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct SimTrack {
    id: String,
    enabled: AtomicBool,
}

impl SimTrack {
    fn microphone(participant: usize) -> TrackHandle {
        Arc::new(Self {
            id: format!("mic-{participant}"),
            enabled: AtomicBool::new(true),
        })
    }
}

impl MediaTrack for SimTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> MediaKind {
        MediaKind::Audio
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    fn stop(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }
}

/// Round-robin talker schedule: participant `i` talks during turn `i`, and
/// one turn per cycle is silence.
struct TurnTakingHost {
    started: Instant,
    participants: usize,
}

impl TurnTakingHost {
    fn talker_at(&self, now: Instant) -> Option<usize> {
        let turn = (now - self.started).as_millis() / TURN.as_millis();
        let slot = (turn % (self.participants as u128 + 1)) as usize;
        (slot < self.participants).then_some(slot)
    }
}

struct TurnAnalyser {
    host: Arc<TurnTakingHost>,
    participant: usize,
}

impl AudioAnalyser for TurnAnalyser {
    fn time_domain_bytes(&mut self, buf: &mut [u8]) {
        let amplitude = if self.host.talker_at(Instant::now()) == Some(self.participant) {
            VOICE_AMPLITUDE
        } else {
            0
        };
        for (i, sample) in buf.iter_mut().enumerate() {
            *sample = if i % 2 == 0 { 128 + amplitude } else { 128 - amplitude };
        }
    }
}

struct SimAudioHost(Arc<TurnTakingHost>);

impl AudioHost for SimAudioHost {
    fn create_analyser(
        &self,
        track: &TrackHandle,
        _fft_size: usize,
        _smoothing: f64,
    ) -> Result<Box<dyn AudioAnalyser>, MediaError> {
        let participant = track
            .id()
            .strip_prefix("mic-")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| MediaError::NotSupported(format!("unknown track {}", track.id())))?;
        Ok(Box::new(TurnAnalyser {
            host: self.0.clone(),
            participant,
        }))
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

fn uid(participant: usize) -> String {
    format!("sim-{participant}")
}

/// Seed a record whose heartbeat stopped well past the stale threshold.
async fn seed_crashed_participant(
    store: &MemoryPresenceStore,
    call: &CallKey,
    config: &PresenceConfig,
) -> Result<(), StoreError> {
    let stale_for = chrono::Duration::from_std(config.stale_threshold * 2)
        .unwrap_or_else(|_| chrono::Duration::seconds(60));
    let doc = ParticipantPresence::new(
        "crashed",
        &PresenceProfile::new("Crashed Client"),
        MediaState::default(),
        Utc::now() - stale_for,
    );
    store.set(call, &doc).await
}

/// Store contents once every simulated participant has left.
#[derive(Debug)]
pub struct SimulationReport {
    pub records: usize,
    pub active: usize,
    /// Whether the seeded crashed participant was marked as left.
    pub crashed_swept: bool,
}

pub async fn run(options: SimulationOptions) -> huddle_common::Result<SimulationReport> {
    let count = options.participants.clamp(1, NAMES.len());
    let call = options.call.clone();
    info!(call = %call, participants = count, seconds = options.duration.as_secs(), "starting simulation");

    let store = Arc::new(MemoryPresenceStore::new());
    seed_crashed_participant(&store, &call, &options.presence).await?;

    let mut clients: HashMap<String, Arc<PresenceSync>> = HashMap::new();
    let mut observer_rx = None;
    for i in 0..count {
        let (sync, rx) = PresenceSync::new(store.clone(), options.presence.clone());
        let media = MediaState {
            muted: false,
            deafened: false,
            video_enabled: i == 0,
            screen_sharing: false,
        };
        sync.join(call.clone(), &uid(i), PresenceProfile::new(NAMES[i]), media)
            .await?;
        if observer_rx.is_none() {
            observer_rx = Some(rx);
        }
        clients.insert(uid(i), Arc::new(sync));
    }

    let host = Arc::new(TurnTakingHost {
        started: Instant::now(),
        participants: count,
    });
    let aggregator = SpeakingAggregator::new(options.speaking.clone(), Arc::new(SimAudioHost(host)));
    let speaker_rx = aggregator.subscribe();
    let mut monitored = 0;
    for i in 0..count {
        let stream = MediaStream::new(format!("stream-{i}")).with_track(SimTrack::microphone(i));
        if aggregator.add_participant(&uid(i), &stream).await {
            monitored += 1;
        } else {
            warn!(uid = %uid(i), "speaking detection unavailable");
        }
    }
    if monitored == 0 {
        for client in clients.values() {
            client.leave().await;
        }
        return Err(HuddleError::Other("no participant could be monitored".into()));
    }

    let forward = tokio::spawn(forward_speaking(speaker_rx, clients.clone()));
    let observe = observer_rx.map(|rx| tokio::spawn(log_presence(rx)));

    tokio::time::sleep(options.duration).await;

    aggregator.clear().await;
    forward.abort();
    for (uid, client) in &clients {
        client.leave().await;
        debug!(uid = %uid, "participant left");
    }
    if let Some(observe) = observe {
        observe.abort();
    }

    let remaining = store.documents(&call).await;
    let report = SimulationReport {
        records: remaining.len(),
        active: remaining.iter().filter(|d| d.is_active()).count(),
        crashed_swept: remaining.iter().any(|d| d.uid == "crashed" && !d.is_active()),
    };
    info!(
        call = %call,
        records = report.records,
        active = report.active,
        crashed_swept = report.crashed_swept,
        "simulation finished"
    );
    Ok(report)
}

/// Write speaking transitions back to each participant's presence and log
/// the active speaker.
async fn forward_speaking(
    mut rx: broadcast::Receiver<SpeakerEvent>,
    clients: HashMap<String, Arc<PresenceSync>>,
) {
    loop {
        match rx.recv().await {
            Ok(SpeakerEvent::SpeakingChanged {
                participant_id,
                speaking,
            }) => {
                if let Some(client) = clients.get(&participant_id) {
                    client.set_speaking(speaking).await;
                }
            }
            Ok(SpeakerEvent::ActiveSpeakerChanged(Some(id))) => {
                info!(speaker = %id, "active speaker");
            }
            Ok(SpeakerEvent::ActiveSpeakerChanged(None)) => info!("nobody speaking"),
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => {
                debug!(skipped = n, "speaker events lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn log_presence(mut rx: mpsc::Receiver<PresenceEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            PresenceEvent::Joined(p) => info!(uid = %p.uid, name = %p.display_name, "participant joined"),
            PresenceEvent::Left { uid, display_name } => {
                info!(uid = %uid, name = %display_name, "participant left")
            }
            PresenceEvent::Updated(p) => {
                debug!(uid = %p.uid, speaking = p.speaking, muted = p.muted, "participant updated")
            }
            PresenceEvent::ParticipantsChanged(list) => {
                debug!(count = list.len(), "participant list changed")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(participants: usize) -> (Arc<TurnTakingHost>, Instant) {
        let started = Instant::now();
        (
            Arc::new(TurnTakingHost {
                started,
                participants,
            }),
            started,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn turns_rotate_with_a_silent_slot() {
        let (host, t0) = host(2);
        assert_eq!(host.talker_at(t0), Some(0));
        assert_eq!(host.talker_at(t0 + TURN), Some(1));
        assert_eq!(host.talker_at(t0 + TURN * 2), None);
        assert_eq!(host.talker_at(t0 + TURN * 3), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn analyser_is_loud_only_on_its_turn() {
        let (host, _) = host(2);
        let sim = SimAudioHost(host);
        let mut first = sim.create_analyser(&SimTrack::microphone(0), 512, 0.8).unwrap();
        let mut second = sim.create_analyser(&SimTrack::microphone(1), 512, 0.8).unwrap();

        let mut buf = [0u8; 64];
        first.time_domain_bytes(&mut buf);
        assert!(huddle_call::speaking::rms(&buf) > 0.1);
        second.time_domain_bytes(&mut buf);
        assert_eq!(huddle_call::speaking::rms(&buf), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_track_is_rejected() {
        let (host, _) = host(1);
        let sim = SimAudioHost(host);
        let track: TrackHandle = Arc::new(SimTrack {
            id: "camera".into(),
            enabled: AtomicBool::new(true),
        });
        assert!(sim.create_analyser(&track, 512, 0.8).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn simulation_sweeps_crash_and_leaves_cleanly() {
        let options = SimulationOptions {
            participants: 3,
            duration: Duration::from_secs(16),
            call: CallKey::from("test"),
            speaking: SpeakingConfig::default(),
            presence: PresenceConfig::default(),
        };
        let report = run(options).await.unwrap();
        assert!(report.crashed_swept);
        assert_eq!(report.active, 0);
        // Only the swept record remains; everyone else deleted theirs.
        assert_eq!(report.records, 1);
    }
}
