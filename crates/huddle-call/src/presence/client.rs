//! Presence synchronizer: keeps this participant's record in the shared
//! store alive and mirrors everyone else's.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use huddle_common::{CallKey, StoreError};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use crate::periodic::PeriodicTask;

use super::event_translator::event_translator;
use super::roster::Roster;
use super::store::PresenceStore;
use super::sweep::sweep_stale;
use super::types::{
    MediaState, ParticipantPresence, PresenceConfig, PresenceEvent, PresencePatch,
    PresenceProfile,
};

// ---------------------------------------------------------------------------
// Membership
// ---------------------------------------------------------------------------

/// Everything owned while joined to one call.
struct Membership {
    call: CallKey,
    uid: String,
    heartbeat: PeriodicTask,
    sweep: PeriodicTask,
    feed: Option<JoinHandle<()>>,
    /// Latest speaking value not yet written.
    pending_speaking: Option<bool>,
    speaking_flush: Option<JoinHandle<()>>,
}

impl Membership {
    /// Stop background work. Heartbeat and sweep cycles already running are
    /// let finish, so none of them lands after the record is removed.
    async fn stop_tasks(self) -> (CallKey, String) {
        let Membership {
            call,
            uid,
            heartbeat,
            sweep,
            feed,
            speaking_flush,
            ..
        } = self;
        if let Some(feed) = feed {
            feed.abort();
        }
        if let Some(flush) = speaking_flush {
            flush.abort();
        }
        heartbeat.stop().await;
        sweep.stop().await;
        (call, uid)
    }
}

type SharedMembership = Arc<Mutex<Option<Membership>>>;

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Synchronizes one participant's presence with a [`PresenceStore`].
pub struct PresenceSync {
    store: Arc<dyn PresenceStore>,
    config: PresenceConfig,
    membership: SharedMembership,
    roster: Arc<RwLock<Roster>>,
    event_tx: mpsc::Sender<PresenceEvent>,
}

impl PresenceSync {
    pub fn new(
        store: Arc<dyn PresenceStore>,
        config: PresenceConfig,
    ) -> (Self, mpsc::Receiver<PresenceEvent>) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let sync = Self {
            store,
            config,
            membership: Arc::new(Mutex::new(None)),
            roster: Arc::new(RwLock::new(Roster::default())),
            event_tx,
        };
        (sync, event_rx)
    }

    /// Write our record, subscribe to the call, and start the heartbeat and
    /// stale sweep. Joining the call we are already in is a no-op; joining a
    /// different call leaves the current one first. Only the initial write
    /// can fail the join.
    pub async fn join(
        &self,
        call: CallKey,
        uid: &str,
        profile: PresenceProfile,
        media: MediaState,
    ) -> Result<(), StoreError> {
        let mut membership = self.membership.lock().await;
        if let Some(current) = membership.as_ref() {
            if current.call == call && current.uid == uid {
                debug!(call = %call, uid, "already joined");
                return Ok(());
            }
        }
        if let Some(previous) = membership.take() {
            self.depart(previous).await;
        }

        let doc = ParticipantPresence::new(uid, &profile, media, Utc::now());
        if let Err(e) = self.store.set(&call, &doc).await {
            warn!(call = %call, uid, error = %e, "failed to write presence record");
            return Err(e);
        }

        let feed = match self.store.subscribe(&call).await {
            Ok(feed) => Some(tokio::spawn(event_translator(
                feed,
                self.event_tx.clone(),
                self.roster.clone(),
            ))),
            Err(e) => {
                warn!(call = %call, error = %e, "presence subscription failed");
                None
            }
        };
        let heartbeat = spawn_heartbeat(
            self.store.clone(),
            call.clone(),
            uid.to_string(),
            self.config.heartbeat_interval,
        );
        let sweep = spawn_sweep(
            self.store.clone(),
            call.clone(),
            uid.to_string(),
            self.config.stale_sweep_interval,
            self.config.stale_threshold,
        );

        info!(call = %call, uid, "joined call presence");
        *membership = Some(Membership {
            call,
            uid: uid.to_string(),
            heartbeat,
            sweep,
            feed,
            pending_speaking: None,
            speaking_flush: None,
        });
        Ok(())
    }

    /// Stop all background work and remove our record. Never fails; a
    /// rejected delete falls back to marking the record as left.
    pub async fn leave(&self) {
        let previous = self.membership.lock().await.take();
        if let Some(previous) = previous {
            self.depart(previous).await;
        }
    }

    pub async fn set_muted(&self, muted: bool) {
        self.update_state(PresencePatch {
            muted: Some(muted),
            ..PresencePatch::default()
        })
        .await;
    }

    pub async fn set_deafened(&self, deafened: bool) {
        self.update_state(PresencePatch {
            deafened: Some(deafened),
            ..PresencePatch::default()
        })
        .await;
    }

    pub async fn set_video_enabled(&self, enabled: bool) {
        self.update_state(PresencePatch {
            video_enabled: Some(enabled),
            ..PresencePatch::default()
        })
        .await;
    }

    pub async fn set_screen_sharing(&self, sharing: bool) {
        self.update_state(PresencePatch {
            screen_sharing: Some(sharing),
            ..PresencePatch::default()
        })
        .await;
    }

    /// Record the speaking flag. Calls within one rate-limit window collapse
    /// into a single write of the latest value at the end of the window.
    pub async fn set_speaking(&self, speaking: bool) {
        let mut membership = self.membership.lock().await;
        let Some(current) = membership.as_mut() else {
            return;
        };
        current.pending_speaking = Some(speaking);
        if current.speaking_flush.is_some() {
            return;
        }
        current.speaking_flush = Some(tokio::spawn(flush_speaking(
            self.membership.clone(),
            self.store.clone(),
            self.config.speaking_rate_limit,
        )));
    }

    /// Merge `patch` into our record, refreshing the heartbeat. Failures are
    /// logged, not returned.
    pub async fn update_state(&self, patch: PresencePatch) {
        let target = {
            let membership = self.membership.lock().await;
            membership.as_ref().map(|m| (m.call.clone(), m.uid.clone()))
        };
        let Some((call, uid)) = target else {
            debug!("presence update while not joined");
            return;
        };
        let patch = patch.with_heartbeat(Utc::now());
        if let Err(e) = self.store.merge(&call, &uid, &patch).await {
            warn!(call = %call, uid = %uid, error = %e, "presence update failed");
        }
    }

    /// Active participants seen on the change feed, ourselves included.
    pub async fn participants(&self) -> Vec<ParticipantPresence> {
        self.roster.read().await.participants()
    }

    pub async fn current_call(&self) -> Option<CallKey> {
        let membership = self.membership.lock().await;
        membership.as_ref().map(|m| m.call.clone())
    }

    pub async fn is_joined(&self) -> bool {
        self.membership.lock().await.is_some()
    }

    async fn depart(&self, membership: Membership) {
        let (call, uid) = membership.stop_tasks().await;

        match self.store.delete(&call, &uid).await {
            Ok(()) => info!(call = %call, uid = %uid, "left call presence"),
            Err(e) => {
                warn!(call = %call, uid = %uid, error = %e, "presence delete failed, marking as left");
                if let Err(e) = self.store.merge(&call, &uid, &PresencePatch::left()).await {
                    warn!(call = %call, uid = %uid, error = %e, "failed to mark presence as left");
                }
            }
        }

        self.roster.write().await.clear();
        let _ = self
            .event_tx
            .try_send(PresenceEvent::ParticipantsChanged(Vec::new()));
    }
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

fn spawn_heartbeat(
    store: Arc<dyn PresenceStore>,
    call: CallKey,
    uid: String,
    period: Duration,
) -> PeriodicTask {
    PeriodicTask::spawn(period, move || {
        let (store, call, uid) = (store.clone(), call.clone(), uid.clone());
        async move {
            match store
                .merge(&call, &uid, &PresencePatch::heartbeat(Utc::now()))
                .await
            {
                Ok(()) => debug!(call = %call, uid = %uid, "presence heartbeat"),
                Err(e) => warn!(call = %call, uid = %uid, error = %e, "presence heartbeat failed"),
            }
            ControlFlow::Continue(())
        }
    })
}

fn spawn_sweep(
    store: Arc<dyn PresenceStore>,
    call: CallKey,
    uid: String,
    period: Duration,
    threshold: Duration,
) -> PeriodicTask {
    PeriodicTask::spawn(period, move || {
        let (store, call, uid) = (store.clone(), call.clone(), uid.clone());
        async move {
            match sweep_stale(store.as_ref(), &call, &uid, threshold, Utc::now()).await {
                Ok(0) => debug!(call = %call, "no stale participants"),
                Ok(_) => {}
                Err(e) => warn!(call = %call, error = %e, "stale sweep failed"),
            }
            ControlFlow::Continue(())
        }
    })
}

async fn flush_speaking(membership: SharedMembership, store: Arc<dyn PresenceStore>, window: Duration) {
    time::sleep(window).await;
    let (call, uid, speaking) = {
        let mut guard = membership.lock().await;
        let Some(current) = guard.as_mut() else {
            return;
        };
        // This task is the one being cleared; dropping the handle detaches it.
        current.speaking_flush = None;
        let Some(speaking) = current.pending_speaking.take() else {
            return;
        };
        (current.call.clone(), current.uid.clone(), speaking)
    };

    let patch = PresencePatch {
        speaking: Some(speaking),
        ..PresencePatch::default()
    }
    .with_heartbeat(Utc::now());
    if let Err(e) = store.merge(&call, &uid, &patch).await {
        warn!(call = %call, uid = %uid, error = %e, "speaking update failed");
    }
}
