//! Local roster of active participants, built from store change batches.

use std::collections::HashMap;

use super::store::{ChangeKind, DocumentChange};
use super::types::{ParticipantPresence, PresenceEvent};

/// Active participants keyed by uid.
#[derive(Debug, Default)]
pub struct Roster {
    by_uid: HashMap<String, ParticipantPresence>,
}

impl Roster {
    /// Classify one change and fold it into the roster. Returns `None` for
    /// changes that concern participants the roster never saw.
    pub fn apply(&mut self, change: DocumentChange) -> Option<PresenceEvent> {
        let DocumentChange { kind, doc } = change;
        if kind == ChangeKind::Removed || !doc.is_active() {
            let previous = self.by_uid.remove(&doc.uid)?;
            return Some(PresenceEvent::Left {
                uid: doc.uid,
                display_name: previous.display_name,
            });
        }

        match self.by_uid.insert(doc.uid.clone(), doc.clone()) {
            None => Some(PresenceEvent::Joined(doc)),
            Some(_) => Some(PresenceEvent::Updated(doc)),
        }
    }

    /// Active participants, earliest joiner first.
    pub fn participants(&self) -> Vec<ParticipantPresence> {
        let mut list: Vec<ParticipantPresence> = self.by_uid.values().cloned().collect();
        list.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then_with(|| a.uid.cmp(&b.uid)));
        list
    }

    pub fn get(&self, uid: &str) -> Option<&ParticipantPresence> {
        self.by_uid.get(uid)
    }

    pub fn len(&self) -> usize {
        self.by_uid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_uid.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_uid.clear();
    }
}
