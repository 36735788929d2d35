//! In-process fakes for the host seams, used by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use huddle_common::{CallKey, MediaError, StoreError, TransportError};
use tokio::sync::mpsc;

use crate::connection::{
    IceCandidate, PeerTransport, RtcConfiguration, SenderId, SessionDescription, StatsReport,
    TransportEvent, TransportFactory,
};
use crate::media::{
    AudioConstraints, MediaDevices, MediaKind, MediaTrack, TrackHandle, VideoConstraints,
};
use crate::presence::{
    ChangeFeed, MemoryPresenceStore, ParticipantPresence, PresencePatch, PresenceQuery,
    PresenceStore,
};
use crate::speaking::{AudioAnalyser, AudioHost};

// ---------------------------------------------------------------------------
// Media
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub(crate) struct FakeTrack {
    id: String,
    kind: MediaKind,
    enabled: AtomicBool,
    stopped: AtomicBool,
}

impl FakeTrack {
    pub fn new(id: &str, kind: MediaKind) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            kind,
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn audio(id: &str) -> TrackHandle {
        Self::new(id, MediaKind::Audio)
    }

    pub fn video(id: &str) -> TrackHandle {
        Self::new(id, MediaKind::Video)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl MediaTrack for FakeTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

pub(crate) struct FakeDevices {
    pub audio_fails: AtomicBool,
    /// Camera profiles wider than this are rejected.
    pub max_video_width: AtomicU32,
    counter: AtomicUsize,
    issued: StdMutex<Vec<Arc<FakeTrack>>>,
    video_requests: StdMutex<Vec<u32>>,
}

impl FakeDevices {
    pub fn new() -> Self {
        Self {
            audio_fails: AtomicBool::new(false),
            max_video_width: AtomicU32::new(u32::MAX),
            counter: AtomicUsize::new(0),
            issued: StdMutex::new(Vec::new()),
            video_requests: StdMutex::new(Vec::new()),
        }
    }

    /// Every track handed out, in order.
    pub fn issued(&self) -> Vec<Arc<FakeTrack>> {
        self.issued.lock().unwrap().clone()
    }

    /// Widths of every camera profile requested.
    pub fn video_requests(&self) -> Vec<u32> {
        self.video_requests.lock().unwrap().clone()
    }

    fn issue(&self, kind: MediaKind) -> TrackHandle {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let track = FakeTrack::new(&format!("{kind}-{n}"), kind);
        self.issued.lock().unwrap().push(track.clone());
        track
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn acquire_audio(
        &self,
        _constraints: &AudioConstraints,
    ) -> Result<TrackHandle, MediaError> {
        if self.audio_fails.load(Ordering::SeqCst) {
            return Err(MediaError::DeviceError("permission denied".into()));
        }
        Ok(self.issue(MediaKind::Audio))
    }

    async fn acquire_video(
        &self,
        constraints: &VideoConstraints,
    ) -> Result<TrackHandle, MediaError> {
        self.video_requests.lock().unwrap().push(constraints.width);
        if constraints.width > self.max_video_width.load(Ordering::SeqCst) {
            return Err(MediaError::ConstraintsUnsatisfiable(format!(
                "{}x{}",
                constraints.width, constraints.height
            )));
        }
        Ok(self.issue(MediaKind::Video))
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

pub(crate) struct FakeTransport {
    events: mpsc::UnboundedSender<TransportEvent>,
    configs: StdMutex<Vec<RtcConfiguration>>,
    calls: StdMutex<Vec<String>>,
    stats: StdMutex<Result<Vec<StatsReport>, TransportError>>,
    pub fail_restart: AtomicBool,
    next_sender: AtomicU32,
    closed: AtomicBool,
}

impl FakeTransport {
    fn new(config: RtcConfiguration, events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self {
            events,
            configs: StdMutex::new(vec![config]),
            calls: StdMutex::new(Vec::new()),
            stats: StdMutex::new(Ok(Vec::new())),
            fail_restart: AtomicBool::new(false),
            next_sender: AtomicU32::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Push an event as if the host raised it.
    pub fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls equal to `name` or starting with `name:`.
    pub fn count(&self, name: &str) -> usize {
        let prefix = format!("{name}:");
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == name || c.starts_with(&prefix))
            .count()
    }

    pub fn set_stats(&self, stats: Result<Vec<StatsReport>, TransportError>) {
        *self.stats.lock().unwrap() = stats;
    }

    pub fn last_config(&self) -> RtcConfiguration {
        self.configs.lock().unwrap().last().cloned().unwrap_or_default()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

fn sdp_label(desc: &SessionDescription) -> &'static str {
    match desc.kind {
        crate::connection::SdpType::Offer => "offer",
        crate::connection::SdpType::Answer => "answer",
    }
}

#[async_trait]
impl PeerTransport for FakeTransport {
    async fn add_track(&self, track: TrackHandle) -> Result<SenderId, TransportError> {
        self.record(format!("add_track:{}", track.id()));
        Ok(SenderId(self.next_sender.fetch_add(1, Ordering::SeqCst)))
    }

    async fn replace_track(
        &self,
        _sender: SenderId,
        track: Option<TrackHandle>,
    ) -> Result<(), TransportError> {
        let id = track.as_ref().map(|t| t.id().to_string()).unwrap_or_default();
        self.record(format!("replace_track:{id}"));
        Ok(())
    }

    async fn create_offer(&self, ice_restart: bool) -> Result<SessionDescription, TransportError> {
        if ice_restart {
            self.record("offer:restart");
            if self.fail_restart.load(Ordering::SeqCst) {
                return Err(TransportError::Negotiation("ice restart rejected".into()));
            }
            return Ok(SessionDescription::offer("restart-offer"));
        }
        self.record("offer");
        Ok(SessionDescription::offer("offer"))
    }

    async fn create_answer(&self) -> Result<SessionDescription, TransportError> {
        self.record("answer");
        Ok(SessionDescription::answer("answer"))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), TransportError> {
        self.record(format!("local:{}", sdp_label(&desc)));
        Ok(())
    }

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), TransportError> {
        self.record(format!("remote:{}", sdp_label(&desc)));
        Ok(())
    }

    async fn add_ice_candidate(&self, _candidate: IceCandidate) -> Result<(), TransportError> {
        self.record("candidate");
        Ok(())
    }

    fn set_configuration(&self, config: &RtcConfiguration) -> Result<(), TransportError> {
        self.record("set_configuration");
        self.configs.lock().unwrap().push(config.clone());
        Ok(())
    }

    async fn get_stats(&self) -> Result<Vec<StatsReport>, TransportError> {
        self.record("stats");
        self.stats.lock().unwrap().clone()
    }

    async fn close(&self) {
        self.record("close");
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub(crate) struct FakeFactory {
    pub fail: AtomicBool,
    created: StdMutex<Vec<Arc<FakeTransport>>>,
}

impl FakeFactory {
    pub fn latest(&self) -> Arc<FakeTransport> {
        self.created
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no transport created")
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

impl TransportFactory for FakeFactory {
    fn create(
        &self,
        config: &RtcConfiguration,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>, TransportError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("no media runtime".into()));
        }
        let transport = Arc::new(FakeTransport::new(config.clone(), events));
        self.created.lock().unwrap().push(transport.clone());
        Ok(transport)
    }
}

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

/// Audio host producing a square wave per track, with a settable amplitude.
/// RMS equals `amplitude / 128`.
pub(crate) struct ToneHost {
    supported: bool,
    amplitudes: StdMutex<HashMap<String, Arc<AtomicU8>>>,
    analysers: AtomicUsize,
}

impl ToneHost {
    pub fn new() -> Self {
        Self {
            supported: true,
            amplitudes: StdMutex::new(HashMap::new()),
            analysers: AtomicUsize::new(0),
        }
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    pub fn set_amplitude(&self, track_id: &str, amplitude: u8) {
        self.amplitude(track_id)
            .store(amplitude.min(127), Ordering::SeqCst);
    }

    pub fn analyser_count(&self) -> usize {
        self.analysers.load(Ordering::SeqCst)
    }

    fn amplitude(&self, track_id: &str) -> Arc<AtomicU8> {
        self.amplitudes
            .lock()
            .unwrap()
            .entry(track_id.to_string())
            .or_default()
            .clone()
    }
}

struct ToneAnalyser {
    amplitude: Arc<AtomicU8>,
}

impl AudioAnalyser for ToneAnalyser {
    fn time_domain_bytes(&mut self, buf: &mut [u8]) {
        let a = self.amplitude.load(Ordering::SeqCst);
        for (i, sample) in buf.iter_mut().enumerate() {
            *sample = if i % 2 == 0 { 128 + a } else { 128 - a };
        }
    }
}

impl AudioHost for ToneHost {
    fn create_analyser(
        &self,
        track: &TrackHandle,
        _fft_size: usize,
        _smoothing: f64,
    ) -> Result<Box<dyn AudioAnalyser>, MediaError> {
        if !self.supported {
            return Err(MediaError::NotSupported("no audio graph".into()));
        }
        self.analysers.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ToneAnalyser {
            amplitude: self.amplitude(track.id()),
        }))
    }
}

// ---------------------------------------------------------------------------
// Presence store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StoreWrite {
    Set(String),
    Merge(String, PresencePatch),
    Delete(String),
    Batch(Vec<String>),
}

/// Memory store that records every write attempt and can reject some.
#[derive(Default)]
pub(crate) struct RecordingStore {
    pub inner: MemoryPresenceStore,
    pub reject_set: AtomicBool,
    pub reject_delete: AtomicBool,
    /// Rejects both `merge` and `batch_merge`.
    pub reject_merge: AtomicBool,
    /// Merges take this long and are recorded once they complete.
    pub merge_delay: StdMutex<Duration>,
    writes: StdMutex<Vec<StoreWrite>>,
}

impl RecordingStore {
    pub fn writes(&self) -> Vec<StoreWrite> {
        self.writes.lock().unwrap().clone()
    }

    /// Values of every speaking write, in order.
    pub fn speaking_writes(&self) -> Vec<bool> {
        self.writes()
            .into_iter()
            .filter_map(|w| match w {
                StoreWrite::Merge(_, patch) => patch.speaking,
                _ => None,
            })
            .collect()
    }

    /// Merges that carry nothing but a heartbeat.
    pub fn heartbeat_writes(&self) -> usize {
        self.writes()
            .iter()
            .filter(|w| match w {
                StoreWrite::Merge(_, patch) => {
                    patch.last_heartbeat.map(PresencePatch::heartbeat).as_ref() == Some(patch)
                }
                _ => false,
            })
            .count()
    }

    pub fn count(&self, pred: impl Fn(&StoreWrite) -> bool) -> usize {
        self.writes().iter().filter(|w| pred(w)).count()
    }

    fn record(&self, write: StoreWrite) {
        self.writes.lock().unwrap().push(write);
    }
}

#[async_trait]
impl PresenceStore for RecordingStore {
    async fn set(&self, call: &CallKey, doc: &ParticipantPresence) -> Result<(), StoreError> {
        self.record(StoreWrite::Set(doc.uid.clone()));
        if self.reject_set.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("permission denied".into()));
        }
        self.inner.set(call, doc).await
    }

    async fn merge(
        &self,
        call: &CallKey,
        uid: &str,
        patch: &PresencePatch,
    ) -> Result<(), StoreError> {
        let delay = *self.merge_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.record(StoreWrite::Merge(uid.to_string(), patch.clone()));
        if self.reject_merge.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("permission denied".into()));
        }
        self.inner.merge(call, uid, patch).await
    }

    async fn delete(&self, call: &CallKey, uid: &str) -> Result<(), StoreError> {
        self.record(StoreWrite::Delete(uid.to_string()));
        if self.reject_delete.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("permission denied".into()));
        }
        self.inner.delete(call, uid).await
    }

    async fn query(
        &self,
        call: &CallKey,
        query: &PresenceQuery,
    ) -> Result<Vec<ParticipantPresence>, StoreError> {
        self.inner.query(call, query).await
    }

    async fn batch_merge(
        &self,
        call: &CallKey,
        updates: &[(String, PresencePatch)],
    ) -> Result<(), StoreError> {
        self.record(StoreWrite::Batch(
            updates.iter().map(|(uid, _)| uid.clone()).collect(),
        ));
        if self.reject_merge.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("permission denied".into()));
        }
        self.inner.batch_merge(call, updates).await
    }

    async fn subscribe(&self, call: &CallKey) -> Result<ChangeFeed, StoreError> {
        self.inner.subscribe(call).await
    }
}
