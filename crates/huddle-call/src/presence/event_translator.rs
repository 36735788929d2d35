//! Background task that translates store change batches into `PresenceEvent`s.

use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use super::roster::Roster;
use super::store::ChangeFeed;
use super::types::PresenceEvent;

/// Drain `feed`, folding each batch into `roster` and emitting one event per
/// recognised change followed by the full participant list.
pub(crate) async fn event_translator(
    mut feed: ChangeFeed,
    event_tx: mpsc::Sender<PresenceEvent>,
    roster: Arc<RwLock<Roster>>,
) {
    while let Some(batch) = feed.recv().await {
        let mut roster_guard = roster.write().await;
        let events: Vec<PresenceEvent> = batch
            .into_iter()
            .filter_map(|change| roster_guard.apply(change))
            .collect();
        let participants = roster_guard.participants();
        drop(roster_guard);

        for event in events {
            let _ = event_tx.send(event).await;
        }
        let _ = event_tx
            .send(PresenceEvent::ParticipantsChanged(participants))
            .await;
    }
    debug!("presence change feed closed");
}
