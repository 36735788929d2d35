//! In-process presence store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use huddle_common::{CallKey, StoreError};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

use super::store::{ChangeFeed, ChangeKind, DocumentChange, PresenceQuery, PresenceStore};
use super::types::{ParticipantPresence, PresencePatch};

const FEED_CAPACITY: usize = 256;

#[derive(Default)]
struct Collection {
    docs: BTreeMap<String, ParticipantPresence>,
    subscribers: Vec<mpsc::Sender<Vec<DocumentChange>>>,
}

impl Collection {
    fn notify(&mut self, call: &CallKey, batch: Vec<DocumentChange>) {
        if batch.is_empty() {
            return;
        }
        self.subscribers.retain(|tx| match tx.try_send(batch.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(call = %call, "presence subscriber lagging, dropping batch");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }
}

/// A [`PresenceStore`] held in memory, shared by every client in the process.
#[derive(Default)]
pub struct MemoryPresenceStore {
    calls: RwLock<HashMap<CallKey, Collection>>,
}

impl MemoryPresenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, call: &CallKey, uid: &str) -> Option<ParticipantPresence> {
        let calls = self.calls.read().await;
        calls.get(call).and_then(|c| c.docs.get(uid).cloned())
    }

    /// All documents in `call`, ordered by uid.
    pub async fn documents(&self, call: &CallKey) -> Vec<ParticipantPresence> {
        let calls = self.calls.read().await;
        calls
            .get(call)
            .map(|c| c.docs.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn subscriber_count(&self, call: &CallKey) -> usize {
        let calls = self.calls.read().await;
        calls
            .get(call)
            .map(|c| c.subscribers.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl PresenceStore for MemoryPresenceStore {
    async fn set(&self, call: &CallKey, doc: &ParticipantPresence) -> Result<(), StoreError> {
        let mut calls = self.calls.write().await;
        let collection = calls.entry(call.clone()).or_default();
        let kind = match collection.docs.insert(doc.uid.clone(), doc.clone()) {
            Some(_) => ChangeKind::Modified,
            None => ChangeKind::Added,
        };
        collection.notify(
            call,
            vec![DocumentChange {
                kind,
                doc: doc.clone(),
            }],
        );
        Ok(())
    }

    async fn merge(
        &self,
        call: &CallKey,
        uid: &str,
        patch: &PresencePatch,
    ) -> Result<(), StoreError> {
        let mut calls = self.calls.write().await;
        let collection = calls
            .get_mut(call)
            .ok_or_else(|| StoreError::NotFound(format!("{call}/{uid}")))?;
        let doc = collection
            .docs
            .get_mut(uid)
            .ok_or_else(|| StoreError::NotFound(format!("{call}/{uid}")))?;
        patch.apply_to(doc);
        let change = DocumentChange {
            kind: ChangeKind::Modified,
            doc: doc.clone(),
        };
        collection.notify(call, vec![change]);
        Ok(())
    }

    async fn delete(&self, call: &CallKey, uid: &str) -> Result<(), StoreError> {
        let mut calls = self.calls.write().await;
        let Some(collection) = calls.get_mut(call) else {
            return Ok(());
        };
        if let Some(doc) = collection.docs.remove(uid) {
            collection.notify(
                call,
                vec![DocumentChange {
                    kind: ChangeKind::Removed,
                    doc,
                }],
            );
        }
        Ok(())
    }

    async fn query(
        &self,
        call: &CallKey,
        query: &PresenceQuery,
    ) -> Result<Vec<ParticipantPresence>, StoreError> {
        let calls = self.calls.read().await;
        let docs: Vec<ParticipantPresence> = calls
            .get(call)
            .map(|c| {
                c.docs
                    .values()
                    .filter(|d| d.status == query.status && d.last_heartbeat < query.heartbeat_before)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(docs)
    }

    async fn batch_merge(
        &self,
        call: &CallKey,
        updates: &[(String, PresencePatch)],
    ) -> Result<(), StoreError> {
        if updates.is_empty() {
            return Ok(());
        }
        let mut calls = self.calls.write().await;
        let collection = calls
            .get_mut(call)
            .ok_or_else(|| StoreError::NotFound(call.to_string()))?;
        if let Some((missing, _)) = updates
            .iter()
            .find(|(uid, _)| !collection.docs.contains_key(uid))
        {
            return Err(StoreError::NotFound(format!("{call}/{missing}")));
        }

        let mut batch = Vec::with_capacity(updates.len());
        for (uid, patch) in updates {
            if let Some(doc) = collection.docs.get_mut(uid) {
                patch.apply_to(doc);
                batch.push(DocumentChange {
                    kind: ChangeKind::Modified,
                    doc: doc.clone(),
                });
            }
        }
        debug!(call = %call, count = batch.len(), "batch merge applied");
        collection.notify(call, batch);
        Ok(())
    }

    async fn subscribe(&self, call: &CallKey) -> Result<ChangeFeed, StoreError> {
        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        let mut calls = self.calls.write().await;
        let collection = calls.entry(call.clone()).or_default();
        let initial: Vec<DocumentChange> = collection
            .docs
            .values()
            .map(|doc| DocumentChange {
                kind: ChangeKind::Added,
                doc: doc.clone(),
            })
            .collect();
        if !initial.is_empty() {
            // Fresh channel: cannot be full.
            let _ = tx.try_send(initial);
        }
        collection.subscribers.push(tx);
        Ok(rx)
    }
}
