//! Sensor query state

use std::sync::Arc;

use hashbrown::HashMap;
use uuid::Uuid;

use crate::scene::entity::{sense_flags, EntitySnapshot, NpcPose};
use crate::sensor::events::EventSink;
use crate::util::vec3::Vec3;

/// Identity of a sensing subscriber (one script) and where its events go
#[derive(Clone)]
pub struct SubscriberHandle {
    /// Subscriber (script) id; registry key together with the NPC id
    pub id: Uuid,
    /// Object hosting the subscriber, excluded from its own hit sets
    pub object_id: Uuid,
    pub sink: Arc<dyn EventSink>,
}

impl SubscriberHandle {
    pub fn new(id: Uuid, object_id: Uuid, sink: Arc<dyn EventSink>) -> Self {
        Self { id, object_id, sink }
    }
}

/// What a query is looking for
#[derive(Debug, Clone)]
pub struct SensorFilter {
    pub type_mask: u32,
    pub exact_key: Option<Uuid>,
    /// Empty string means no name filtering
    pub name_filter: String,
    pub radius: f32,
    /// Cone half-angle in radians; π is omnidirectional
    pub arc: f32,
    arc_cos_threshold: f32,
}

impl SensorFilter {
    /// Build a filter, paying the arc trigonometry once for the whole
    /// query lifetime
    pub fn new(
        type_mask: u32,
        exact_key: Option<Uuid>,
        name_filter: String,
        radius: f32,
        arc: f32,
    ) -> Self {
        let arc_cos_threshold = arc.clamp(0.0, std::f32::consts::PI).cos();
        Self {
            type_mask,
            exact_key,
            name_filter,
            radius,
            arc,
            arc_cos_threshold,
        }
    }

    /// Precomputed cos(arc); candidates compare their direction cosine
    /// against this instead of calling inverse trig
    #[inline]
    pub fn arc_cos_threshold(&self) -> f32 {
        self.arc_cos_threshold
    }

    #[inline]
    pub fn wants_agents(&self) -> bool {
        self.type_mask & sense_flags::ANY_AGENT != 0
    }

    #[inline]
    pub fn wants_objects(&self) -> bool {
        self.type_mask & sense_flags::ANY_OBJECT != 0
    }
}

/// Sense origin captured at each evaluation
#[derive(Debug, Clone, Copy, Default)]
pub struct SenseOrigin {
    pub position: Vec3,
    /// Unit forward vector of the sensing NPC
    pub forward: Vec3,
}

/// One active query: filter, cadence bookkeeping, and the hit set carried
/// between evaluations
pub struct SensorQuery {
    pub subscriber_id: Uuid,
    pub npc_id: Uuid,
    /// Object hosting the subscribing script
    pub own_object_id: Uuid,
    pub filter: SensorFilter,
    /// Seconds between firings; zero for one-shot queries
    pub cadence: f32,
    /// Remaining time until the next firing
    pub countdown: f32,
    pub origin: SenseOrigin,
    /// Entity id to last-known snapshot
    pub hits: HashMap<Uuid, EntitySnapshot>,
    pub sink: Arc<dyn EventSink>,
}

impl SensorQuery {
    pub fn new(
        subscriber: &SubscriberHandle,
        npc_id: Uuid,
        filter: SensorFilter,
        cadence: f32,
    ) -> Self {
        Self {
            subscriber_id: subscriber.id,
            npc_id,
            own_object_id: subscriber.object_id,
            filter,
            cadence,
            countdown: cadence,
            origin: SenseOrigin::default(),
            hits: HashMap::new(),
            sink: subscriber.sink.clone(),
        }
    }

    /// Recapture the sense origin from the NPC's current pose
    pub fn update_origin(&mut self, pose: &NpcPose) {
        self.origin = SenseOrigin {
            position: pose.position,
            forward: pose.rotation.forward(),
        };
    }
}
