//! Flat per-region index of sensable entities
//!
//! Tracks root-level live objects and agents currently present. Lookups
//! are O(tracked entities) per full scan; the incremental ingestion path
//! keeps repeat sensors from paying that scan every tick.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::scene::entity::{AgentAccess, ObjectSnapshot};
use crate::scene::update::{SceneUpdate, LINK_ROOT};

/// Outcome of folding one scene update into the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The object is now tracked (inserted or replaced)
    Tracked,
    /// The update disqualified the entity and it was dropped
    Removed,
}

/// Concurrent per-region entity index
pub struct SpatialIndex {
    objects: RwLock<HashMap<Uuid, Arc<ObjectSnapshot>>>,
    agents: RwLock<HashMap<Uuid, Arc<dyn AgentAccess>>>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            agents: RwLock::new(HashMap::new()),
        }
    }

    /// Fold an update notification into the object map
    ///
    /// Only root-level, non-killed objects with a snapshot attached stay
    /// tracked; every other update is a removal of that entity id.
    pub fn upsert(&self, update: &SceneUpdate) -> UpsertOutcome {
        if update.is_killed || update.parent_link != LINK_ROOT {
            self.objects.write().remove(&update.entity_id);
            return UpsertOutcome::Removed;
        }
        match &update.object {
            Some(obj) => {
                self.objects.write().insert(update.entity_id, obj.clone());
                UpsertOutcome::Tracked
            }
            None => {
                self.objects.write().remove(&update.entity_id);
                UpsertOutcome::Removed
            }
        }
    }

    pub fn remove_object(&self, id: Uuid) {
        self.objects.write().remove(&id);
    }

    pub fn agent_present(&self, agent: Arc<dyn AgentAccess>) {
        self.agents.write().insert(agent.id(), agent);
    }

    pub fn agent_absent(&self, id: Uuid) {
        self.agents.write().remove(&id);
    }

    pub fn object(&self, id: Uuid) -> Option<Arc<ObjectSnapshot>> {
        self.objects.read().get(&id).cloned()
    }

    pub fn agent(&self, id: Uuid) -> Option<Arc<dyn AgentAccess>> {
        self.agents.read().get(&id).cloned()
    }

    /// Point-in-time snapshot of tracked objects, safe to iterate while
    /// writers proceed
    pub fn all_objects(&self) -> Vec<Arc<ObjectSnapshot>> {
        self.objects.read().values().cloned().collect()
    }

    /// Point-in-time snapshot of present agents
    pub fn all_agents(&self) -> Vec<Arc<dyn AgentAccess>> {
        self.agents.read().values().cloned().collect()
    }

    pub fn object_count(&self) -> usize {
        self.objects.read().len()
    }

    pub fn agent_count(&self) -> usize {
        self.agents.read().len()
    }

    pub fn clear(&self) {
        self.objects.write().clear();
        self.agents.write().clear();
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}
