//! Background ingestion of scene update notifications
//!
//! One worker per region drains the update queue so scene producers never
//! block on sensing work. Each qualifying update lands in the index and is
//! then offered to every active repeating query that does not already hold
//! the entity, which is what lets repeat sensors skip full object rescans
//! on their ticks.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::region::RegionShared;
use crate::scene::entity::EntitySnapshot;
use crate::scene::update::SceneUpdate;
use crate::sensor::index::UpsertOutcome;
use crate::sensor::matcher;

/// Bounded dequeue wait so the stop flag is honored without a notification
const DEQUEUE_WAIT: Duration = Duration::from_millis(1000);

/// Worker thread entry point
pub(crate) fn run(shared: Arc<RegionShared>, updates: Receiver<SceneUpdate>) {
    tracing::debug!(region = %shared.region_id, "sensor ingestion worker started");
    loop {
        if shared.stop.load(Ordering::Relaxed) {
            break;
        }
        let update = match updates.recv_timeout(DEQUEUE_WAIT) {
            Ok(update) => update,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        if shared.stop.load(Ordering::Relaxed) {
            break;
        }
        // A defect in one notification must never halt ingestion
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            process_update(&shared, &update);
        }));
        if outcome.is_err() {
            tracing::error!(
                region = %shared.region_id,
                entity = %update.entity_id,
                "unexpected panic while ingesting a scene update"
            );
        }
    }
    tracing::debug!(region = %shared.region_id, "sensor ingestion worker stopped");
}

/// Fold one notification into the index and incrementally re-test queries
pub(crate) fn process_update(shared: &RegionShared, update: &SceneUpdate) {
    if shared.index.upsert(update) == UpsertOutcome::Removed {
        return;
    }
    let Some(obj) = update.object.as_ref() else {
        return;
    };

    let snap = EntitySnapshot::from_object(obj);
    let mode = shared.config.agent_name_mode;
    for handle in shared.registry.snapshot() {
        let mut query = handle.lock();
        if query.hits.contains_key(&snap.id) {
            continue;
        }
        if matcher::matches(&query, &snap, mode) {
            query.hits.insert(snap.id, snap.clone());
        }
    }
}
