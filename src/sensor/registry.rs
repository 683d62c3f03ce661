//! Per-region collection of active repeating queries

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;
use uuid::Uuid;

use crate::sensor::query::SensorQuery;

/// Shared handle to one live query; locked individually so the scheduler,
/// the ingestion worker, and registrations never contend on the whole map
pub type QueryHandle = Arc<Mutex<SensorQuery>>;

/// NPC id → subscriber id → query, repeating queries only
pub struct SensorRegistry {
    inner: RwLock<HashMap<Uuid, HashMap<Uuid, QueryHandle>>>,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a query, replacing any prior query for the same
    /// (NPC, subscriber) key
    pub fn insert(&self, query: SensorQuery) -> QueryHandle {
        let npc_id = query.npc_id;
        let subscriber_id = query.subscriber_id;
        let handle = Arc::new(Mutex::new(query));
        self.inner
            .write()
            .entry(npc_id)
            .or_default()
            .insert(subscriber_id, handle.clone());
        handle
    }

    /// Remove one (NPC, subscriber) query; empty NPC buckets are dropped
    pub fn remove(&self, npc_id: Uuid, subscriber_id: Uuid) -> Option<QueryHandle> {
        let mut map = self.inner.write();
        let bucket = map.get_mut(&npc_id)?;
        let removed = bucket.remove(&subscriber_id);
        if bucket.is_empty() {
            map.remove(&npc_id);
        }
        removed
    }

    /// Purge every query a subscriber owns, across all NPC buckets
    pub fn remove_subscriber(&self, subscriber_id: Uuid) -> usize {
        let mut map = self.inner.write();
        let mut removed = 0;
        map.retain(|_, bucket| {
            if bucket.remove(&subscriber_id).is_some() {
                removed += 1;
            }
            !bucket.is_empty()
        });
        removed
    }

    /// Snapshot of every active query, safe to walk while the map mutates
    pub fn snapshot(&self) -> SmallVec<[QueryHandle; 16]> {
        self.inner
            .read()
            .values()
            .flat_map(|bucket| bucket.values().cloned())
            .collect()
    }

    /// Snapshot of one subscriber's queries
    pub fn snapshot_for_subscriber(&self, subscriber_id: Uuid) -> SmallVec<[QueryHandle; 16]> {
        self.inner
            .read()
            .values()
            .filter_map(|bucket| bucket.get(&subscriber_id).cloned())
            .collect()
    }

    /// Smallest cadence among active queries, if any
    pub fn min_cadence(&self) -> Option<f32> {
        self.inner
            .read()
            .values()
            .flat_map(|bucket| bucket.values())
            .map(|q| q.lock().cadence)
            .fold(None, |acc, c| match acc {
                Some(best) if best <= c => Some(best),
                _ => Some(c),
            })
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Total number of active queries
    pub fn len(&self) -> usize {
        self.inner.read().values().map(|bucket| bucket.len()).sum()
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }
}

impl Default for SensorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
