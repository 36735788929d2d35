//! Call presence backed by a shared document store.
//!
//! Each participant owns one document per call and keeps it alive with a
//! heartbeat. Every client also sweeps the call for records whose heartbeat
//! has gone stale (crashed clients) and flips them to `left`.

mod client;
mod event_translator;
mod memory;
mod roster;
mod store;
mod sweep;
mod types;

pub use client::PresenceSync;
pub use memory::MemoryPresenceStore;
pub use roster::Roster;
pub use store::{ChangeFeed, ChangeKind, DocumentChange, PresenceQuery, PresenceStore};
pub use sweep::sweep_stale;
pub use types::{
    MediaState, ParticipantPresence, PresenceConfig, PresenceEvent, PresencePatch,
    PresenceProfile, PresenceStatus,
};
