//! Entity seams between the scene collaborator and the sensing engine
//!
//! The engine never holds owning links back into the scene graph: objects
//! arrive as immutable snapshots on the update feed, agents and NPCs are
//! reached through injected accessor traits keyed by id.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::quat::Quat;
use crate::util::vec3::Vec3;

/// Sensor type-mask bits
///
/// A query's mask is the bitwise OR of the categories it wants to detect.
pub mod sense_flags {
    /// Avatars controlled by a person
    pub const AGENT: u32 = 0x01;
    /// Physics-active objects; for agents, the not-sitting state
    pub const ACTIVE: u32 = 0x02;
    /// Physics-passive objects; for agents, the sitting state
    pub const PASSIVE: u32 = 0x04;
    /// Scripted objects (scan gate only, never filtered on)
    pub const SCRIPTED: u32 = 0x08;
    /// Agents matched by dotted username
    pub const AGENT_BY_USERNAME: u32 = 0x10;
    /// Scripted NPC agents
    pub const NPC: u32 = 0x20;

    /// Any bit that turns on agent sensing
    pub const ANY_AGENT: u32 = AGENT | AGENT_BY_USERNAME | NPC;
    /// Any bit that turns on object sensing
    pub const ANY_OBJECT: u32 = ACTIVE | PASSIVE | SCRIPTED;
}

/// Immutable description of one root-level object, produced by the scene
/// collaborator and carried on the update feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    pub id: Uuid,
    pub name: String,
    pub owner: Uuid,
    pub position: Vec3,
    pub rotation: Quat,
    pub is_physical: bool,
    pub is_attached: bool,
}

/// Live view of an agent present in a region
///
/// Implemented by the scene collaborator. Position and sitting state are
/// read at match time so repeat sensors track moving agents without a
/// per-move notification.
pub trait AgentAccess: Send + Sync {
    fn id(&self) -> Uuid;
    fn position(&self) -> Vec3;
    fn rotation(&self) -> Quat;
    fn first_name(&self) -> String;
    fn last_name(&self) -> String;
    fn is_npc(&self) -> bool;
    fn is_sitting(&self) -> bool;
    /// Region the agent currently belongs to, for cross-region moves
    fn current_region(&self) -> Uuid;
}

/// Pose of an NPC able to issue sensing queries
#[derive(Debug, Clone, Copy)]
pub struct NpcPose {
    pub id: Uuid,
    pub position: Vec3,
    pub rotation: Quat,
    pub owner: Uuid,
}

/// Resolves NPC ids to their current pose
///
/// Injected per region; a `None` means the NPC left or was removed and is
/// treated as a transient miss, never an error.
pub trait NpcResolver: Send + Sync {
    fn npc_pose(&self, id: Uuid) -> Option<NpcPose>;
}

/// Point-in-time record of a sensed entity, as delivered to subscribers
/// and stored in a query's hit set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: Uuid,
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    pub owner: Uuid,
    pub position: Vec3,
    pub rotation: Quat,
    pub is_agent: bool,
    pub is_npc: bool,
    pub is_physical: bool,
    pub is_attached: bool,
    pub is_sitting: bool,
}

impl EntitySnapshot {
    pub fn from_object(obj: &ObjectSnapshot) -> Self {
        Self {
            id: obj.id,
            name: obj.name.clone(),
            first_name: String::new(),
            last_name: String::new(),
            owner: obj.owner,
            position: obj.position,
            rotation: obj.rotation,
            is_agent: false,
            is_npc: false,
            is_physical: obj.is_physical,
            is_attached: obj.is_attached,
            is_sitting: false,
        }
    }

    pub fn from_agent(agent: &dyn AgentAccess) -> Self {
        let first = agent.first_name();
        let last = agent.last_name();
        let name = if last.is_empty() {
            first.clone()
        } else {
            format!("{} {}", first, last)
        };
        Self {
            id: agent.id(),
            name,
            first_name: first,
            last_name: last,
            // An avatar is its own owner
            owner: agent.id(),
            position: agent.position(),
            rotation: agent.rotation(),
            is_agent: true,
            is_npc: agent.is_npc(),
            is_physical: !agent.is_sitting(),
            is_attached: false,
            is_sitting: agent.is_sitting(),
        }
    }
}
