//! Peer connection manager: transport lifecycle, reconnection, local tracks,
//! and stats polling for one remote participant.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::{Arc, Weak};

use huddle_common::{SessionId, TransportError};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::media::{
    AudioConstraints, MediaDevices, MediaKind, MediaStream, TrackHandle, VIDEO_PROFILES,
};
use crate::periodic::PeriodicTask;

use super::quality::{QualitySampler, QualitySnapshot};
use super::transport::{
    IceCandidate, IceConnectionState, IceServer, PeerTransport, RtcConfiguration, SenderId,
    SessionDescription, TransportEvent, TransportFactory, TransportState,
};
use super::types::{ConnectionConfig, ConnectionEvent, ConnectionState};

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

struct LocalTrack {
    track: TrackHandle,
    /// Present while the track is attached to the live transport.
    sender: Option<SenderId>,
}

struct Session {
    id: SessionId,
    state: ConnectionState,
    ice_state: IceConnectionState,
    transport: Option<Arc<dyn PeerTransport>>,
    rtc_config: Option<RtcConfiguration>,
    audio: Option<LocalTrack>,
    video: Option<LocalTrack>,
    remote_streams: HashMap<String, MediaStream>,
    reconnect_attempts: u32,
    /// Set between scheduling an attempt and issuing it; further failure
    /// signals are ignored meanwhile.
    reconnect_pending: bool,
    sampler: QualitySampler,
    last_snapshot: Option<QualitySnapshot>,
    pump: Option<JoinHandle<()>>,
    /// Dropping it stops polling; an in-flight query is left to finish.
    stats_task: Option<PeriodicTask>,
    grace_task: Option<JoinHandle<()>>,
    reconnect_task: Option<JoinHandle<()>>,
}

struct Shared {
    peer: String,
    config: ConnectionConfig,
    factory: Arc<dyn TransportFactory>,
    devices: Arc<dyn MediaDevices>,
    session: Mutex<Session>,
    event_tx: mpsc::Sender<ConnectionEvent>,
}

fn cancel(task: &mut Option<JoinHandle<()>>) {
    if let Some(handle) = task.take() {
        handle.abort();
    }
}

// ---------------------------------------------------------------------------
// Connection Manager
// ---------------------------------------------------------------------------

/// Owns the peer transport to one remote participant.
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl ConnectionManager {
    pub fn new(
        peer: impl Into<String>,
        config: ConnectionConfig,
        factory: Arc<dyn TransportFactory>,
        devices: Arc<dyn MediaDevices>,
    ) -> (Self, mpsc::Receiver<ConnectionEvent>) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let session = Session {
            id: SessionId::new(),
            state: ConnectionState::Idle,
            ice_state: IceConnectionState::New,
            transport: None,
            rtc_config: None,
            audio: None,
            video: None,
            remote_streams: HashMap::new(),
            reconnect_attempts: 0,
            reconnect_pending: false,
            sampler: QualitySampler::new(config.thresholds.clone()),
            last_snapshot: None,
            pump: None,
            stats_task: None,
            grace_task: None,
            reconnect_task: None,
        };
        let mgr = Self {
            shared: Arc::new(Shared {
                peer: peer.into(),
                config,
                factory,
                devices,
                session: Mutex::new(session),
                event_tx,
            }),
        };
        (mgr, event_rx)
    }

    /// Remote participant this manager connects to.
    pub fn peer(&self) -> &str {
        &self.shared.peer
    }

    pub async fn state(&self) -> ConnectionState {
        self.shared.session.lock().await.state
    }

    pub async fn session_id(&self) -> SessionId {
        self.shared.session.lock().await.id.clone()
    }

    pub async fn reconnect_attempts(&self) -> u32 {
        self.shared.session.lock().await.reconnect_attempts
    }

    /// Most recent stats snapshot, if a cycle has completed.
    pub async fn quality(&self) -> Option<QualitySnapshot> {
        self.shared.session.lock().await.last_snapshot.clone()
    }

    pub async fn remote_streams(&self) -> HashMap<String, MediaStream> {
        self.shared.session.lock().await.remote_streams.clone()
    }

    /// ICE servers the live transport is configured with.
    pub async fn ice_servers(&self) -> Vec<IceServer> {
        self.shared
            .session
            .lock()
            .await
            .rtc_config
            .as_ref()
            .map(|c| c.ice_servers.clone())
            .unwrap_or_default()
    }

    pub async fn local_audio(&self) -> Option<TrackHandle> {
        let session = self.shared.session.lock().await;
        session.audio.as_ref().map(|l| l.track.clone())
    }

    pub async fn local_video(&self) -> Option<TrackHandle> {
        let session = self.shared.session.lock().await;
        session.video.as_ref().map(|l| l.track.clone())
    }

    // ---- lifecycle ----

    /// Create a fresh transport, replacing any existing one, and attach the
    /// current local tracks to it.
    pub async fn initialize(&self) -> Result<Arc<dyn PeerTransport>, TransportError> {
        let shared = &self.shared;
        let mut guard = shared.session.lock().await;
        let session = &mut *guard;

        shared.teardown_transport(session).await;
        session.id = SessionId::new();
        shared.set_state(session, ConnectionState::Connecting);

        let rtc = shared
            .config
            .rtc_configuration(session.reconnect_attempts > 0);
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = match shared.factory.create(&rtc, tx) {
            Ok(t) => t,
            Err(e) => {
                warn!(peer = %shared.peer, error = %e, "failed to create peer transport");
                shared.set_state(session, ConnectionState::Failed);
                shared.emit(ConnectionEvent::Error {
                    peer: shared.peer.clone(),
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        for local in [&mut session.audio, &mut session.video]
            .into_iter()
            .flatten()
        {
            local.sender = attach(&shared.peer, transport.as_ref(), None, local.track.clone()).await;
        }

        session.pump = Some(tokio::spawn(event_pump(Arc::downgrade(shared), rx)));
        session.transport = Some(transport.clone());
        session.rtc_config = Some(rtc);

        info!(peer = %shared.peer, session = %session.id, "peer transport created");
        Ok(transport)
    }

    /// Tear everything down. Safe to call repeatedly and before `initialize`.
    pub async fn cleanup(&self) {
        let shared = &self.shared;
        let mut guard = shared.session.lock().await;
        let session = &mut *guard;

        for local in [session.audio.take(), session.video.take()]
            .into_iter()
            .flatten()
        {
            local.track.stop();
        }
        shared.teardown_transport(session).await;
        session.reconnect_attempts = 0;
        shared.set_state(session, ConnectionState::Closed);
        debug!(peer = %shared.peer, "connection cleaned up");
    }

    /// Treat the link as lost: schedule a reconnect attempt or give up.
    pub async fn handle_disconnection(&self, reason: &str) {
        let mut guard = self.shared.session.lock().await;
        self.shared.on_disconnection(&mut guard, reason);
    }

    /// User-initiated reconnect with a fresh attempt budget.
    pub async fn reconnect(&self) -> Result<(), TransportError> {
        let mut guard = self.shared.session.lock().await;
        let session = &mut *guard;
        session.reconnect_attempts = 0;
        session.reconnect_pending = false;
        cancel(&mut session.reconnect_task);

        if session.transport.is_none() {
            drop(guard);
            info!(peer = %self.shared.peer, "manual reconnect without transport, reinitializing");
            return self.initialize().await.map(|_| ());
        }

        session.stats_task = None;
        self.shared.schedule_reconnect(session, "manual reconnect");
        Ok(())
    }

    // ---- local media ----

    /// Acquire the microphone. Replaces (and stops) any previous audio track.
    pub async fn acquire_audio(&self) -> Option<TrackHandle> {
        let shared = &self.shared;
        let track = match shared.devices.acquire_audio(&AudioConstraints::VOICE).await {
            Ok(t) => t,
            Err(e) => {
                warn!(peer = %shared.peer, error = %e, "microphone unavailable");
                return None;
            }
        };
        let mut session = shared.session.lock().await;
        shared.install_local_track(&mut session, track.clone()).await;
        info!(peer = %shared.peer, track = track.id(), "microphone acquired");
        Some(track)
    }

    /// Acquire the camera, falling back through lower-resolution profiles.
    pub async fn acquire_video(&self) -> Option<TrackHandle> {
        let shared = &self.shared;
        for constraints in VIDEO_PROFILES.iter() {
            match shared.devices.acquire_video(constraints).await {
                Ok(track) => {
                    let mut session = shared.session.lock().await;
                    shared.install_local_track(&mut session, track.clone()).await;
                    info!(
                        peer = %shared.peer,
                        width = constraints.width,
                        height = constraints.height,
                        "camera acquired"
                    );
                    return Some(track);
                }
                Err(e) => {
                    debug!(width = constraints.width, error = %e, "camera profile rejected");
                }
            }
        }
        warn!(peer = %shared.peer, "no camera profile could be satisfied");
        None
    }

    /// Returns false when there is no local audio track.
    pub async fn set_audio_enabled(&self, enabled: bool) -> bool {
        let session = self.shared.session.lock().await;
        match &session.audio {
            Some(local) => {
                local.track.set_enabled(enabled);
                true
            }
            None => false,
        }
    }

    /// Returns false when there is no local video track.
    pub async fn set_video_enabled(&self, enabled: bool) -> bool {
        let session = self.shared.session.lock().await;
        match &session.video {
            Some(local) => {
                local.track.set_enabled(enabled);
                true
            }
            None => false,
        }
    }

    // ---- signaling ----

    pub async fn create_offer(&self) -> Result<SessionDescription, TransportError> {
        let transport = self.transport().await?;
        let offer = transport.create_offer(false).await?;
        transport.set_local_description(offer.clone()).await?;
        Ok(offer)
    }

    /// Apply a remote offer and return the local answer.
    pub async fn accept_offer(
        &self,
        offer: SessionDescription,
    ) -> Result<SessionDescription, TransportError> {
        let transport = self.transport().await?;
        transport.set_remote_description(offer).await?;
        let answer = transport.create_answer().await?;
        transport.set_local_description(answer.clone()).await?;
        Ok(answer)
    }

    pub async fn accept_answer(&self, answer: SessionDescription) -> Result<(), TransportError> {
        self.transport().await?.set_remote_description(answer).await
    }

    pub async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError> {
        self.transport().await?.add_ice_candidate(candidate).await
    }

    async fn transport(&self) -> Result<Arc<dyn PeerTransport>, TransportError> {
        self.shared
            .session
            .lock()
            .await
            .transport
            .clone()
            .ok_or(TransportError::Closed)
    }
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

impl Shared {
    fn emit(&self, event: ConnectionEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            debug!(peer = %self.peer, error = %e, "dropping connection event");
        }
    }

    fn set_state(&self, session: &mut Session, state: ConnectionState) {
        if session.state == state {
            return;
        }
        let from = session.state;
        session.state = state;
        info!(peer = %self.peer, %from, to = %state, "connection state changed");
        self.emit(ConnectionEvent::StateChanged {
            peer: self.peer.clone(),
            state,
        });
    }

    async fn teardown_transport(&self, session: &mut Session) {
        session.stats_task = None;
        cancel(&mut session.grace_task);
        cancel(&mut session.reconnect_task);
        session.reconnect_pending = false;
        // Detach from transport events before closing so the close itself
        // does not feed back into the state machine.
        cancel(&mut session.pump);

        if let Some(transport) = session.transport.take() {
            transport.close().await;
            debug!(peer = %self.peer, session = %session.id, "peer transport closed");
        }
        session.rtc_config = None;
        for local in [&mut session.audio, &mut session.video]
            .into_iter()
            .flatten()
        {
            local.sender = None;
        }
        session.remote_streams.clear();
        session.sampler.reset();
        session.last_snapshot = None;
        session.ice_state = IceConnectionState::New;
    }

    async fn install_local_track(&self, session: &mut Session, track: TrackHandle) {
        let transport = session.transport.clone();
        let slot = match track.kind() {
            MediaKind::Audio => &mut session.audio,
            MediaKind::Video => &mut session.video,
        };
        if let Some(existing) = slot.as_mut() {
            if existing.track.id() != track.id() {
                existing.track.stop();
            }
            existing.track = track.clone();
            if let Some(transport) = transport {
                existing.sender =
                    attach(&self.peer, transport.as_ref(), existing.sender, track).await;
            }
            return;
        }

        let sender = match transport {
            Some(transport) => attach(&self.peer, transport.as_ref(), None, track.clone()).await,
            None => None,
        };
        *slot = Some(LocalTrack { track, sender });
    }

    async fn handle_transport_event(self: &Arc<Self>, event: TransportEvent) {
        let mut guard = self.session.lock().await;
        let session = &mut *guard;
        match event {
            TransportEvent::StateChanged(state) => match state {
                TransportState::Connected => self.on_connected(session),
                TransportState::Disconnected => {
                    self.on_disconnection(session, "transport disconnected")
                }
                TransportState::Failed => self.on_disconnection(session, "transport failed"),
                other => debug!(peer = %self.peer, state = ?other, "transport state"),
            },
            TransportEvent::IceStateChanged(ice) => {
                session.ice_state = ice;
                match ice {
                    IceConnectionState::Disconnected => self.start_grace_timer(session),
                    IceConnectionState::Connected | IceConnectionState::Completed => {
                        cancel(&mut session.grace_task);
                    }
                    IceConnectionState::Failed => {
                        cancel(&mut session.grace_task);
                        self.on_disconnection(session, "ice failed");
                    }
                    _ => {}
                }
            }
            TransportEvent::LocalCandidate(candidate) => {
                self.emit(ConnectionEvent::LocalCandidate {
                    peer: self.peer.clone(),
                    candidate,
                });
            }
            TransportEvent::RemoteTrack { track, stream_id } => {
                let stream = session
                    .remote_streams
                    .entry(self.peer.clone())
                    .or_insert_with(|| MediaStream::new(stream_id.clone()));
                if stream.id() != stream_id {
                    *stream = MediaStream::new(stream_id);
                }
                debug!(peer = %self.peer, kind = %track.kind(), "remote track received");
                stream.add_track(track);
                let stream = stream.clone();
                self.emit(ConnectionEvent::RemoteStream {
                    peer: self.peer.clone(),
                    stream,
                });
            }
        }
    }

    fn on_connected(self: &Arc<Self>, session: &mut Session) {
        if session.reconnect_attempts > 0 {
            info!(peer = %self.peer, attempts = session.reconnect_attempts, "reconnected");
        }
        session.reconnect_attempts = 0;
        session.reconnect_pending = false;
        cancel(&mut session.reconnect_task);
        cancel(&mut session.grace_task);
        self.set_state(session, ConnectionState::Connected);
        self.start_stats_loop(session);
    }

    fn on_disconnection(self: &Arc<Self>, session: &mut Session, reason: &str) {
        if session.transport.is_none()
            || matches!(
                session.state,
                ConnectionState::Idle | ConnectionState::Closed | ConnectionState::Failed
            )
        {
            debug!(peer = %self.peer, state = %session.state, reason, "ignoring disconnection");
            return;
        }
        if session.reconnect_pending {
            debug!(peer = %self.peer, reason, "reconnect already pending");
            return;
        }

        session.stats_task = None;

        if session.reconnect_attempts >= self.config.max_reconnect_attempts {
            let attempts = session.reconnect_attempts;
            warn!(peer = %self.peer, attempts, reason, "giving up on connection");
            self.set_state(session, ConnectionState::Failed);
            self.emit(ConnectionEvent::Error {
                peer: self.peer.clone(),
                message: TransportError::ReconnectExhausted { attempts }.to_string(),
            });
            return;
        }

        self.schedule_reconnect(session, reason);
    }

    fn schedule_reconnect(self: &Arc<Self>, session: &mut Session, reason: &str) {
        session.reconnect_attempts += 1;
        session.reconnect_pending = true;
        let attempt = session.reconnect_attempts;
        let delay = self.config.backoff(attempt);

        info!(
            peer = %self.peer,
            attempt,
            delay_ms = delay.as_millis() as u64,
            reason,
            "scheduling reconnect"
        );
        self.set_state(session, ConnectionState::Reconnecting);

        let weak = Arc::downgrade(self);
        cancel(&mut session.reconnect_task);
        session.reconnect_task = Some(tokio::spawn(async move {
            time::sleep(delay).await;
            if let Some(shared) = weak.upgrade() {
                shared.run_reconnect_attempt(attempt).await;
            }
        }));
    }

    async fn run_reconnect_attempt(self: &Arc<Self>, attempt: u32) {
        let mut guard = self.session.lock().await;
        let session = &mut *guard;
        // This task is the one being cleared; dropping the handle detaches it.
        session.reconnect_task = None;
        session.reconnect_pending = false;

        if session.state != ConnectionState::Reconnecting {
            debug!(peer = %self.peer, attempt, state = %session.state, "reconnect no longer needed");
            return;
        }
        let Some(transport) = session.transport.clone() else {
            return;
        };

        let rtc = self.config.rtc_configuration(true);
        if let Err(e) = transport.set_configuration(&rtc) {
            warn!(peer = %self.peer, error = %e, "failed to apply fallback relays");
        }
        session.rtc_config = Some(rtc);

        match restart_ice(transport.as_ref()).await {
            Ok(offer) => {
                info!(peer = %self.peer, attempt, "ice restart offer created");
                self.emit(ConnectionEvent::RestartOffer {
                    peer: self.peer.clone(),
                    offer,
                });
            }
            Err(e) => {
                warn!(peer = %self.peer, attempt, error = %e, "ice restart failed");
                self.on_disconnection(session, "ice restart failed");
            }
        }
    }

    fn start_grace_timer(self: &Arc<Self>, session: &mut Session) {
        if session.grace_task.is_some() || session.state != ConnectionState::Connected {
            return;
        }
        let grace = self.config.ice_disconnect_grace;
        debug!(peer = %self.peer, grace_ms = grace.as_millis() as u64, "ice disconnected, waiting");

        let weak = Arc::downgrade(self);
        session.grace_task = Some(tokio::spawn(async move {
            time::sleep(grace).await;
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let mut session = shared.session.lock().await;
            session.grace_task = None;
            if session.ice_state == IceConnectionState::Disconnected {
                shared.on_disconnection(&mut session, "ice disconnect grace expired");
            }
        }));
    }

    fn start_stats_loop(self: &Arc<Self>, session: &mut Session) {
        if session.stats_task.is_some() {
            return;
        }
        let weak = Arc::downgrade(self);
        session.stats_task = Some(PeriodicTask::spawn(self.config.stats_interval, move || {
            let weak = weak.clone();
            async move {
                let Some(shared) = weak.upgrade() else {
                    return ControlFlow::Break(());
                };
                shared.collect_stats().await;
                ControlFlow::Continue(())
            }
        }));
    }

    async fn collect_stats(&self) {
        let (transport, session_id) = {
            let session = self.session.lock().await;
            if session.state != ConnectionState::Connected {
                return;
            }
            match &session.transport {
                Some(t) => (t.clone(), session.id.clone()),
                None => return,
            }
        };

        let reports = match transport.get_stats().await {
            Ok(reports) => reports,
            Err(e) => {
                debug!(peer = %self.peer, error = %e, "stats collection failed");
                return;
            }
        };

        let mut session = self.session.lock().await;
        if session.id != session_id || session.state != ConnectionState::Connected {
            return;
        }
        let snapshot = session.sampler.sample(&reports, Instant::now());
        let changed = session.last_snapshot.as_ref().map(|s| s.quality) != Some(snapshot.quality);
        session.last_snapshot = Some(snapshot.clone());

        if changed {
            info!(
                peer = %self.peer,
                quality = ?snapshot.quality,
                rtt_ms = snapshot.rtt_ms,
                packet_loss = snapshot.packet_loss,
                "connection quality changed"
            );
            self.emit(ConnectionEvent::QualityChanged {
                peer: self.peer.clone(),
                snapshot,
            });
            self.emit(ConnectionEvent::StateChanged {
                peer: self.peer.clone(),
                state: session.state,
            });
        }
    }
}

/// Attach `track` to the transport, swapping it into `sender` when one exists.
async fn attach(
    peer: &str,
    transport: &dyn PeerTransport,
    sender: Option<SenderId>,
    track: TrackHandle,
) -> Option<SenderId> {
    match sender {
        Some(sender) => {
            if let Err(e) = transport.replace_track(sender, Some(track)).await {
                warn!(peer, error = %e, "failed to replace local track");
            }
            Some(sender)
        }
        None => match transport.add_track(track).await {
            Ok(sender) => Some(sender),
            Err(e) => {
                warn!(peer, error = %e, "failed to attach local track");
                None
            }
        },
    }
}

async fn restart_ice(transport: &dyn PeerTransport) -> Result<SessionDescription, TransportError> {
    let offer = transport.create_offer(true).await?;
    transport.set_local_description(offer.clone()).await?;
    Ok(offer)
}

async fn event_pump(weak: Weak<Shared>, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
    while let Some(event) = events.recv().await {
        let Some(shared) = weak.upgrade() else {
            break;
        };
        shared.handle_transport_event(event).await;
    }
}
