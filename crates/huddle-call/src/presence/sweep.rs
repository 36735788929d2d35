//! Stale presence sweep.

use std::time::Duration;

use chrono::{DateTime, Utc};
use huddle_common::{CallKey, StoreError};
use tracing::info;

use super::store::{PresenceQuery, PresenceStore};
use super::types::{PresencePatch, PresenceStatus};

/// Flip every active record whose heartbeat predates `now - threshold` to
/// `left`, in one batch. The sweeper's own record is never touched. Returns
/// the number of records flipped; zero means no write was issued.
pub async fn sweep_stale(
    store: &dyn PresenceStore,
    call: &CallKey,
    own_uid: &str,
    threshold: Duration,
    now: DateTime<Utc>,
) -> Result<usize, StoreError> {
    let cutoff = chrono::Duration::from_std(threshold)
        .ok()
        .and_then(|d| now.checked_sub_signed(d))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let stale = store
        .query(
            call,
            &PresenceQuery {
                status: PresenceStatus::Active,
                heartbeat_before: cutoff,
            },
        )
        .await?;

    let updates: Vec<(String, PresencePatch)> = stale
        .into_iter()
        .filter(|doc| doc.uid != own_uid)
        .map(|doc| (doc.uid, PresencePatch::left()))
        .collect();
    if updates.is_empty() {
        return Ok(0);
    }

    store.batch_merge(call, &updates).await?;
    let uids: Vec<&str> = updates.iter().map(|(uid, _)| uid.as_str()).collect();
    info!(call = %call, count = updates.len(), ?uids, "marked stale participants as left");
    Ok(updates.len())
}
