//! Per-region sensing services
//!
//! Each registered region owns its spatial index, its registry of
//! repeating queries, one ingestion worker thread, and one scheduler
//! thread. Everything is created when the region registers and torn down
//! cooperatively when it deregisters; nothing is process-global.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::config::SensorConfig;
use crate::error::SensorError;
use crate::scene::entity::{AgentAccess, EntitySnapshot, NpcResolver};
use crate::scene::update::SceneUpdate;
use crate::sensor::events::SensorEvent;
use crate::sensor::index::SpatialIndex;
use crate::sensor::matcher;
use crate::sensor::persist::{self, PersistValue, SensorRecord};
use crate::sensor::query::{SensorFilter, SensorQuery, SubscriberHandle};
use crate::sensor::registry::SensorRegistry;
use crate::sensor::scheduler::{TimerControl, TimerMsg};
use crate::sensor::{ingest, scheduler};

/// Control channel depth; rearm messages are idempotent so overflow is
/// harmless
const CTRL_CAPACITY: usize = 16;

/// State shared between the region handle and its background threads
pub(crate) struct RegionShared {
    pub(crate) region_id: Uuid,
    pub(crate) config: SensorConfig,
    pub(crate) index: SpatialIndex,
    pub(crate) registry: SensorRegistry,
    pub(crate) npcs: Arc<dyn NpcResolver>,
    pub(crate) timer: Mutex<TimerControl>,
    pub(crate) stop: AtomicBool,
}

impl RegionShared {
    pub(crate) fn new(region_id: Uuid, npcs: Arc<dyn NpcResolver>, config: SensorConfig) -> Self {
        let initial_interval = config.min_interval;
        Self {
            region_id,
            config,
            index: SpatialIndex::new(),
            registry: SensorRegistry::new(),
            npcs,
            timer: Mutex::new(TimerControl::new(initial_interval)),
            stop: AtomicBool::new(false),
        }
    }
}

/// Handle to one region's sensing services
pub struct RegionSensors {
    pub(crate) shared: Arc<RegionShared>,
    update_tx: Sender<SceneUpdate>,
    ctrl_tx: Sender<TimerMsg>,
    worker: Mutex<Option<JoinHandle<()>>>,
    timer_thread: Mutex<Option<JoinHandle<()>>>,
    torn_down: AtomicBool,
}

impl std::fmt::Debug for RegionSensors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionSensors")
            .field("region_id", &self.shared.region_id)
            .field("torn_down", &self.torn_down.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl RegionSensors {
    /// Create the region's services and start its background threads
    pub fn new(
        region_id: Uuid,
        npcs: Arc<dyn NpcResolver>,
        config: SensorConfig,
    ) -> Result<Self, SensorError> {
        let (update_tx, update_rx) = bounded(config.queue_capacity);
        let (ctrl_tx, ctrl_rx) = bounded(CTRL_CAPACITY);
        let shared = Arc::new(RegionShared::new(region_id, npcs, config));

        let worker_shared = shared.clone();
        let worker = std::thread::Builder::new()
            .name(format!("npc-sensor-ingest-{}", region_id))
            .spawn(move || ingest::run(worker_shared, update_rx))?;

        let timer_shared = shared.clone();
        let timer_thread = std::thread::Builder::new()
            .name(format!("npc-sensor-timer-{}", region_id))
            .spawn(move || scheduler::run(timer_shared, ctrl_rx))?;

        Ok(Self {
            shared,
            update_tx,
            ctrl_tx,
            worker: Mutex::new(Some(worker)),
            timer_thread: Mutex::new(Some(timer_thread)),
            torn_down: AtomicBool::new(false),
        })
    }

    pub fn region_id(&self) -> Uuid {
        self.shared.region_id
    }

    /// Number of active repeating queries
    pub fn active_query_count(&self) -> usize {
        self.shared.registry.len()
    }

    pub fn tracked_object_count(&self) -> usize {
        self.shared.index.object_count()
    }

    pub fn present_agent_count(&self) -> usize {
        self.shared.index.agent_count()
    }

    // --- scene collaborator feed ---------------------------------------

    /// Enqueue a scene update for the ingestion worker
    ///
    /// Never blocks the producer; returns false when the region is torn
    /// down or the queue is full.
    pub fn queue_update(&self, update: SceneUpdate) -> bool {
        if self.shared.stop.load(Ordering::Relaxed) {
            return false;
        }
        match self.update_tx.try_send(update) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(region = %self.shared.region_id, "sensor update queue full, dropping update");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn agent_present(&self, agent: Arc<dyn AgentAccess>) {
        self.shared.index.agent_present(agent);
    }

    /// Presence update for an agent moving between regions
    pub fn agent_changed_region(&self, agent: Arc<dyn AgentAccess>) {
        if agent.current_region() == self.shared.region_id {
            self.shared.index.agent_present(agent);
        } else {
            self.shared.index.agent_absent(agent.id());
        }
    }

    pub fn agent_absent(&self, id: Uuid) {
        self.shared.index.agent_absent(id);
    }

    // --- sensing operations --------------------------------------------

    /// One-shot sense: scan the index now, emit exactly one event, store
    /// nothing
    pub fn start_sensor(
        &self,
        subscriber: &SubscriberHandle,
        npc_id: Uuid,
        name_filter: &str,
        exact_key: Option<Uuid>,
        type_mask: u32,
        radius: f32,
        arc: f32,
    ) {
        if type_mask == 0 {
            return;
        }
        let Some(pose) = self.shared.npcs.npc_pose(npc_id) else {
            tracing::debug!(npc = %npc_id, "one-shot sensor for unknown NPC ignored");
            return;
        };

        let filter = SensorFilter::new(type_mask, exact_key, name_filter.to_string(), radius, arc);
        let mut query = SensorQuery::new(subscriber, npc_id, filter, 0.0);
        query.update_origin(&pose);

        let mode = self.shared.config.agent_name_mode;
        if query.filter.wants_objects() {
            for obj in self.shared.index.all_objects() {
                let snap = EntitySnapshot::from_object(&obj);
                if matcher::matches(&query, &snap, mode) {
                    query.hits.insert(snap.id, snap);
                }
            }
        }
        if query.filter.wants_agents() {
            for agent in self.shared.index.all_agents() {
                let snap = EntitySnapshot::from_agent(agent.as_ref());
                if matcher::matches(&query, &snap, mode) {
                    query.hits.insert(snap.id, snap);
                }
            }
        }

        let event = if query.hits.is_empty() {
            SensorEvent::NoneDetected { npc_id }
        } else {
            SensorEvent::Detected {
                npc_id,
                detected: matcher::distance_sorted(
                    query.origin.position,
                    query.hits.into_values(),
                ),
            }
        };
        subscriber.sink.post(event);
    }

    /// Register (or replace) a repeating query and fold its cadence into
    /// the shared timer
    #[allow(clippy::too_many_arguments)]
    pub fn start_sensor_repeat(
        &self,
        subscriber: &SubscriberHandle,
        npc_id: Uuid,
        name_filter: &str,
        exact_key: Option<Uuid>,
        type_mask: u32,
        radius: f32,
        arc: f32,
        interval_seconds: f32,
    ) {
        // A zero mask on the repeat surface means "sense everything"
        let type_mask = if type_mask == 0 { !0 } else { type_mask };
        let Some(pose) = self.shared.npcs.npc_pose(npc_id) else {
            tracing::debug!(npc = %npc_id, "repeating sensor for unknown NPC ignored");
            return;
        };

        let cadence = self.shared.config.clamp_cadence(interval_seconds);
        let filter = SensorFilter::new(type_mask, exact_key, name_filter.to_string(), radius, arc);
        let mut query = SensorQuery::new(subscriber, npc_id, filter, cadence);
        query.update_origin(&pose);

        self.shared.registry.insert(query);
        self.rearm_timer();
    }

    /// Remove one (NPC, subscriber) repeating query
    pub fn remove_sensor(&self, npc_id: Uuid, subscriber_id: Uuid) {
        self.shared.registry.remove(npc_id, subscriber_id);
        self.disarm_if_idle();
    }

    /// Remove every repeating query a subscriber owns, across all NPCs
    pub fn remove_all_for_subscriber(&self, subscriber_id: Uuid) {
        let removed = self.shared.registry.remove_subscriber(subscriber_id);
        if removed > 0 {
            tracing::debug!(
                region = %self.shared.region_id,
                subscriber = %subscriber_id,
                removed,
                "removed subscriber sensors"
            );
        }
        self.disarm_if_idle();
    }

    // --- persistence ----------------------------------------------------

    /// Snapshot a subscriber's repeating queries as a flat value stream
    pub fn serialize_subscriber(&self, subscriber_id: Uuid) -> Vec<PersistValue> {
        let mut values = Vec::new();
        for handle in self.shared.registry.snapshot_for_subscriber(subscriber_id) {
            let query = handle.lock();
            values.extend(SensorRecord::from_query(&query).to_values());
        }
        values
    }

    /// Re-create persisted queries as active; records whose NPC no longer
    /// resolves are dropped silently. Returns how many were restored.
    pub fn restore_subscriber(
        &self,
        subscriber: &SubscriberHandle,
        values: &[PersistValue],
    ) -> usize {
        let mut restored = 0;
        for record in persist::parse_records(values) {
            if self.shared.npcs.npc_pose(record.npc_id).is_none() {
                tracing::debug!(npc = %record.npc_id, "dropping persisted sensor for vanished NPC");
                continue;
            }
            self.start_sensor_repeat(
                subscriber,
                record.npc_id,
                &record.name_filter,
                record.exact_key,
                record.type_mask,
                record.radius,
                record.arc,
                record.interval,
            );
            restored += 1;
        }
        restored
    }

    // --- lifecycle ------------------------------------------------------

    /// Stop background work and clear all region state
    ///
    /// Idempotent. Waits a bounded time for each thread; a thread that
    /// fails to stop is detached with a warning rather than blocking the
    /// region forever.
    pub fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!(region = %self.shared.region_id, "tearing down region sensors");

        self.shared.stop.store(true, Ordering::Relaxed);
        let _ = self.ctrl_tx.try_send(TimerMsg::Shutdown);

        let timeout = self.shared.config.worker_join_timeout;
        join_bounded(self.worker.lock().take(), timeout, "ingestion worker");
        join_bounded(self.timer_thread.lock().take(), timeout, "sensor scheduler");

        self.shared.timer.lock().armed = false;
        self.shared.registry.clear();
        self.shared.index.clear();
    }

    fn rearm_timer(&self) {
        let Some(min_cadence) = self.shared.registry.min_cadence() else {
            return;
        };
        let mut timer = self.shared.timer.lock();
        if !timer.armed || min_cadence < timer.interval {
            timer.interval = min_cadence;
            timer.armed = true;
            // Fresh phase so a shrunk interval takes effect promptly
            timer.last_tick = Instant::now();
            drop(timer);
            let _ = self.ctrl_tx.try_send(TimerMsg::Rearm);
        }
    }

    fn disarm_if_idle(&self) {
        if self.shared.registry.is_empty() {
            self.shared.timer.lock().armed = false;
        }
    }
}

impl Drop for RegionSensors {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Wait for a thread up to `timeout`, then give up and detach it
fn join_bounded(handle: Option<JoinHandle<()>>, timeout: Duration, name: &str) {
    let Some(handle) = handle else {
        return;
    };
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            tracing::warn!("{} did not stop within {:?}, detaching", name, timeout);
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    if handle.join().is_err() {
        tracing::error!("{} terminated with a panic", name);
    }
}
