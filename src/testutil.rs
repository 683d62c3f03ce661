//! Shared test doubles for the scene collaborator seams

use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver};
use hashbrown::HashMap;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::scene::entity::{
    AgentAccess, EntitySnapshot, NpcPose, NpcResolver, ObjectSnapshot,
};
use crate::sensor::events::{ChannelSink, EventSink, SensorEvent};
use crate::util::quat::Quat;
use crate::util::vec3::Vec3;

/// Agent double with mutable position and state
pub(crate) struct TestAgent {
    id: Uuid,
    first: String,
    last: String,
    position: Mutex<Vec3>,
    sitting: Mutex<bool>,
    npc: Mutex<bool>,
    region: Mutex<Uuid>,
}

impl TestAgent {
    pub fn new(first: &str, last: &str, position: Vec3) -> Self {
        Self::with_id(Uuid::new_v4(), first, last, position)
    }

    pub fn with_id(id: Uuid, first: &str, last: &str, position: Vec3) -> Self {
        Self {
            id,
            first: first.to_string(),
            last: last.to_string(),
            position: Mutex::new(position),
            sitting: Mutex::new(false),
            npc: Mutex::new(false),
            region: Mutex::new(Uuid::nil()),
        }
    }

    pub fn id_raw(&self) -> Uuid {
        self.id
    }

    pub fn set_position(&self, position: Vec3) {
        *self.position.lock() = position;
    }

    pub fn set_sitting(&self, sitting: bool) {
        *self.sitting.lock() = sitting;
    }

    pub fn set_npc(&self, npc: bool) {
        *self.npc.lock() = npc;
    }

    pub fn set_region(&self, region: Uuid) {
        *self.region.lock() = region;
    }
}

impl AgentAccess for TestAgent {
    fn id(&self) -> Uuid {
        self.id
    }

    fn position(&self) -> Vec3 {
        *self.position.lock()
    }

    fn rotation(&self) -> Quat {
        Quat::IDENTITY
    }

    fn first_name(&self) -> String {
        self.first.clone()
    }

    fn last_name(&self) -> String {
        self.last.clone()
    }

    fn is_npc(&self) -> bool {
        *self.npc.lock()
    }

    fn is_sitting(&self) -> bool {
        *self.sitting.lock()
    }

    fn current_region(&self) -> Uuid {
        *self.region.lock()
    }
}

/// NPC directory double
pub(crate) struct TestNpcs {
    poses: Mutex<HashMap<Uuid, NpcPose>>,
}

impl TestNpcs {
    pub fn new() -> Self {
        Self {
            poses: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, pose: NpcPose) {
        self.poses.lock().insert(pose.id, pose);
    }

    pub fn remove(&self, id: Uuid) {
        self.poses.lock().remove(&id);
    }
}

impl NpcResolver for TestNpcs {
    fn npc_pose(&self, id: Uuid) -> Option<NpcPose> {
        self.poses.lock().get(&id).copied()
    }
}

/// Sink that always panics, for fault-containment tests
pub(crate) struct PanicSink;

impl EventSink for PanicSink {
    fn post(&self, _event: SensorEvent) {
        panic!("sink failure");
    }
}

/// Channel-backed sink plus the receiver to observe posted events
pub(crate) fn collect_sink() -> (Arc<dyn EventSink>, Receiver<SensorEvent>) {
    let (tx, rx) = unbounded();
    (Arc::new(ChannelSink::new(tx)), rx)
}

pub(crate) fn npc_pose(id: Uuid, position: Vec3, rotation: Quat) -> NpcPose {
    NpcPose {
        id,
        position,
        rotation,
        owner: Uuid::new_v4(),
    }
}

pub(crate) fn object_snapshot(name: &str, position: Vec3, is_physical: bool) -> ObjectSnapshot {
    ObjectSnapshot {
        id: Uuid::new_v4(),
        name: name.to_string(),
        owner: Uuid::new_v4(),
        position,
        rotation: Quat::IDENTITY,
        is_physical,
        is_attached: false,
    }
}

pub(crate) fn object_entity(name: &str, position: Vec3, is_physical: bool) -> EntitySnapshot {
    EntitySnapshot::from_object(&object_snapshot(name, position, is_physical))
}

pub(crate) fn agent_entity(first: &str, last: &str, position: Vec3) -> EntitySnapshot {
    EntitySnapshot::from_agent(&TestAgent::new(first, last, position))
}
