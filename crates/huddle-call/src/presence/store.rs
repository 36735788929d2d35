//! The shared presence datastore seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use huddle_common::{CallKey, StoreError};
use tokio::sync::mpsc;

use super::types::{ParticipantPresence, PresencePatch, PresenceStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// One document change delivered to subscribers. For `Removed`, `doc` holds
/// the last known contents.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChange {
    pub kind: ChangeKind,
    pub doc: ParticipantPresence,
}

/// Filter for [`PresenceStore::query`].
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceQuery {
    pub status: PresenceStatus,
    pub heartbeat_before: DateTime<Utc>,
}

/// Change feed for one call. Dropping the receiver unsubscribes.
pub type ChangeFeed = mpsc::Receiver<Vec<DocumentChange>>;

/// A per-call document collection shared by every participant.
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Create or overwrite a document.
    async fn set(&self, call: &CallKey, doc: &ParticipantPresence) -> Result<(), StoreError>;

    /// Merge into an existing document. Fails with `NotFound` if absent.
    async fn merge(&self, call: &CallKey, uid: &str, patch: &PresencePatch)
        -> Result<(), StoreError>;

    async fn delete(&self, call: &CallKey, uid: &str) -> Result<(), StoreError>;

    async fn query(
        &self,
        call: &CallKey,
        query: &PresenceQuery,
    ) -> Result<Vec<ParticipantPresence>, StoreError>;

    /// Apply several merges atomically: all of them or none.
    async fn batch_merge(
        &self,
        call: &CallKey,
        updates: &[(String, PresencePatch)],
    ) -> Result<(), StoreError>;

    /// Subscribe to changes. The first batch lists the current documents as
    /// `Added`.
    async fn subscribe(&self, call: &CallKey) -> Result<ChangeFeed, StoreError>;
}
