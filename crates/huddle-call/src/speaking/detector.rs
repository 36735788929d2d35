//! Per-stream speaking detector.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::media::{MediaStream, MediaTrack};

use super::analysis::{normalize_level, rms, AudioAnalyser, AudioHost};
use super::hysteresis::SpeakingGate;
use super::types::{SpeakingConfig, SpeakingState, SpeakingUpdate};

const MIN_FRAME_INTERVAL: Duration = Duration::from_millis(1);

/// Samples one stream's audio each frame and reports speaking state.
pub struct SpeakingDetector {
    config: SpeakingConfig,
    host: Arc<dyn AudioHost>,
    state: Arc<RwLock<SpeakingState>>,
    task: Mutex<Option<JoinHandle<()>>>,
    event_tx: mpsc::Sender<SpeakingUpdate>,
    /// Last settled speaking flag. Unlike `event_tx` this never blocks.
    speaking_tx: watch::Sender<bool>,
}

impl SpeakingDetector {
    pub fn new(
        config: SpeakingConfig,
        host: Arc<dyn AudioHost>,
    ) -> (Self, mpsc::Receiver<SpeakingUpdate>) {
        let (event_tx, event_rx) = mpsc::channel(64);
        let (speaking_tx, _) = watch::channel(false);
        let detector = Self {
            config,
            host,
            state: Arc::new(RwLock::new(SpeakingState::default())),
            task: Mutex::new(None),
            event_tx,
            speaking_tx,
        };
        (detector, event_rx)
    }

    pub async fn state(&self) -> SpeakingState {
        *self.state.read().await
    }

    /// Watch the speaking flag. Transitions land here even when the update
    /// channel is full.
    pub fn watch_speaking(&self) -> watch::Receiver<bool> {
        self.speaking_tx.subscribe()
    }

    pub async fn is_running(&self) -> bool {
        self.task.lock().await.is_some()
    }

    /// Begin monitoring the first audio track of `stream`, replacing any
    /// previous monitoring. Returns false if the stream has no audio or the
    /// host cannot analyse it.
    pub async fn start(&self, stream: &MediaStream) -> bool {
        self.stop().await;

        let Some(track) = stream.audio_tracks().next() else {
            debug!(stream = stream.id(), "no audio track to monitor");
            return false;
        };
        let analyser =
            match self
                .host
                .create_analyser(track, self.config.fft_size, self.config.smoothing)
            {
                Ok(a) => a,
                Err(e) => {
                    warn!(stream = stream.id(), error = %e, "speaking detection unavailable");
                    return false;
                }
            };

        debug!(stream = stream.id(), track = track.id(), "speaking detection started");
        let handle = tokio::spawn(monitor(
            self.config.clone(),
            analyser,
            self.state.clone(),
            self.event_tx.clone(),
            self.speaking_tx.clone(),
        ));
        *self.task.lock().await = Some(handle);
        true
    }

    /// Stop monitoring and reset to silence. A detector that was speaking
    /// reports the transition to not-speaking.
    pub async fn stop(&self) {
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
            // Wait for the abort so the loop cannot write state after the reset.
            let _ = handle.await;
        }

        let was_speaking = {
            let mut state = self.state.write().await;
            let was = state.is_speaking;
            *state = SpeakingState::default();
            was
        };
        if was_speaking {
            self.speaking_tx.send_replace(false);
            let update = SpeakingUpdate {
                state: SpeakingState::default(),
                transition: true,
                at: Instant::now(),
            };
            if let Err(mpsc::error::TrySendError::Full(_)) = self.event_tx.try_send(update) {
                warn!("update channel full, final speaking transition dropped");
            }
        }
    }
}

async fn monitor(
    config: SpeakingConfig,
    mut analyser: Box<dyn AudioAnalyser>,
    state: Arc<RwLock<SpeakingState>>,
    event_tx: mpsc::Sender<SpeakingUpdate>,
    speaking_tx: watch::Sender<bool>,
) {
    let mut window = vec![128u8; config.fft_size];
    let mut gate = SpeakingGate::new(&config);
    let mut ticker = time::interval(config.frame_interval.max(MIN_FRAME_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        analyser.time_domain_bytes(&mut window);

        let raw_loudness = rms(&window);
        let level = normalize_level(raw_loudness, config.noise_floor, config.level_ceiling);
        let now = Instant::now();
        let gated = gate.update(level, now);
        let next = SpeakingState {
            is_speaking: gated.speaking,
            level,
            raw_loudness,
        };
        *state.write().await = next;
        if gated.transitioned {
            speaking_tx.send_replace(gated.speaking);
        }

        if !gated.emit {
            continue;
        }
        let update = SpeakingUpdate {
            state: next,
            transition: gated.transitioned,
            at: now,
        };
        // The frame loop never waits on a slow consumer.
        if let Err(mpsc::error::TrySendError::Full(_)) = event_tx.try_send(update) {
            if gated.transitioned {
                warn!(speaking = gated.speaking, "update channel full, transition dropped");
            }
        }
    }
}
