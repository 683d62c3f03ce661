//! Shared per-region sensor timer
//!
//! One scheduler thread re-evaluates every active repeating query; there
//! is no per-query timer. The thread sleeps on a control channel for the
//! shared interval (the minimum active cadence) and each query keeps its
//! own countdown, so queries with different cadences fire correctly on a
//! coarser shared tick. Ticks run to completion on the one thread; an
//! evaluation that overruns the interval delays the next tick instead of
//! overlapping it.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use uuid::Uuid;

use crate::region::RegionShared;
use crate::scene::entity::EntitySnapshot;
use crate::sensor::events::SensorEvent;
use crate::sensor::matcher;
use crate::sensor::query::SensorQuery;

/// How long the thread parks between registry checks while the timer is
/// disarmed
const IDLE_POLL: Duration = Duration::from_millis(1000);

/// Control messages for the scheduler thread
pub(crate) enum TimerMsg {
    /// Interval or phase changed; restart the wait with fresh settings
    Rearm,
    Shutdown,
}

/// Shared timer state, guarded by its own lock so interval recomputation
/// never races map access
pub(crate) struct TimerControl {
    /// Current shared interval in seconds
    pub(crate) interval: f32,
    /// Whether ticks fire at all; disarmed whenever the registry is empty
    pub(crate) armed: bool,
    /// Wall-clock reference of the previous tick
    pub(crate) last_tick: Instant,
}

impl TimerControl {
    pub(crate) fn new(interval: f32) -> Self {
        Self {
            interval,
            armed: false,
            last_tick: Instant::now(),
        }
    }
}

/// Scheduler thread entry point
pub(crate) fn run(shared: Arc<RegionShared>, ctrl_rx: Receiver<TimerMsg>) {
    tracing::debug!(region = %shared.region_id, "sensor scheduler started");
    loop {
        if shared.stop.load(Ordering::Relaxed) {
            break;
        }
        let (armed, interval) = {
            let timer = shared.timer.lock();
            (timer.armed, timer.interval)
        };
        let wait = if armed {
            Duration::from_secs_f32(interval)
        } else {
            IDLE_POLL
        };
        match ctrl_rx.recv_timeout(wait) {
            Ok(TimerMsg::Shutdown) => break,
            Ok(TimerMsg::Rearm) => continue,
            Err(RecvTimeoutError::Timeout) => {
                if armed {
                    run_tick(&shared);
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    tracing::debug!(region = %shared.region_id, "sensor scheduler stopped");
}

/// One timer tick: measure real elapsed time and advance every query
fn run_tick(shared: &RegionShared) {
    let elapsed = {
        let mut timer = shared.timer.lock();
        if !timer.armed {
            return;
        }
        let now = Instant::now();
        let elapsed = now.duration_since(timer.last_tick);
        timer.last_tick = now;
        elapsed
    };
    tick_queries(shared, elapsed.as_secs_f32());
}

/// Advance all countdowns by `elapsed` seconds and evaluate due queries
///
/// Split from the timer plumbing so tests drive it with synthetic elapsed
/// times.
pub(crate) fn tick_queries(shared: &RegionShared, elapsed: f32) {
    if shared.registry.is_empty() {
        shared.timer.lock().armed = false;
        return;
    }

    for handle in shared.registry.snapshot() {
        // One faulty query must never take down sensing for the region
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            advance_query(shared, &handle, elapsed);
        }));
        if outcome.is_err() {
            tracing::error!(
                region = %shared.region_id,
                "sensor evaluation panicked, query skipped this tick"
            );
        }
    }

    if shared.registry.is_empty() {
        shared.timer.lock().armed = false;
    }
}

fn advance_query(
    shared: &RegionShared,
    handle: &crate::sensor::registry::QueryHandle,
    elapsed: f32,
) {
    let mut query = handle.lock();
    query.countdown -= elapsed;
    if query.countdown > 0.0 {
        return;
    }
    // Carry the overshoot into the next interval instead of resetting,
    // so long evaluations do not stretch the cadence
    query.countdown += query.cadence;

    let Some(pose) = shared.npcs.npc_pose(query.npc_id) else {
        tracing::debug!(npc = %query.npc_id, "sensing NPC not resolvable, skipping interval");
        return;
    };
    query.update_origin(&pose);

    revalidate_hits(shared, &mut query);
    if query.filter.wants_agents() {
        scan_agents(shared, &mut query);
    }

    let event = if query.hits.is_empty() {
        SensorEvent::NoneDetected { npc_id: query.npc_id }
    } else {
        SensorEvent::Detected {
            npc_id: query.npc_id,
            detected: matcher::distance_sorted(
                query.origin.position,
                query.hits.values().cloned(),
            ),
        }
    };
    let sink = query.sink.clone();
    drop(query);
    sink.post(event);
}

/// Re-test previously-hit entities against the index, refreshing their
/// snapshots and dropping the ones that vanished or no longer match.
/// Much cheaper than a full rescan: only the current hit set is touched.
fn revalidate_hits(shared: &RegionShared, query: &mut SensorQuery) {
    let mode = shared.config.agent_name_mode;
    let ids: Vec<Uuid> = query.hits.keys().copied().collect();
    for id in ids {
        let fresh = if let Some(agent) = shared.index.agent(id) {
            Some(EntitySnapshot::from_agent(agent.as_ref()))
        } else {
            shared
                .index
                .object(id)
                .map(|obj| EntitySnapshot::from_object(&obj))
        };
        match fresh {
            Some(snap) if matcher::matches(query, &snap, mode) => {
                query.hits.insert(id, snap);
            }
            _ => {
                query.hits.remove(&id);
            }
        }
    }
}

/// Scan present agents for new matches. Objects are deliberately not
/// rescanned here; they enter hit sets through the ingestion path only,
/// which bounds per-tick cost to hits + agents.
fn scan_agents(shared: &RegionShared, query: &mut SensorQuery) {
    let mode = shared.config.agent_name_mode;
    for agent in shared.index.all_agents() {
        let id = agent.id();
        if query.hits.contains_key(&id) {
            continue;
        }
        let snap = EntitySnapshot::from_agent(agent.as_ref());
        if matcher::matches(query, &snap, mode) {
            query.hits.insert(id, snap);
        }
    }
}
