//! Scene update notifications consumed by the ingestion worker

use std::sync::Arc;

use uuid::Uuid;

use crate::scene::entity::ObjectSnapshot;

/// Link number of the root part of a composite object
pub const LINK_ROOT: i32 = 1;

/// One object change pushed by the scene collaborator
///
/// A killed or non-root update removes the entity from the index; anything
/// else replaces the tracked snapshot. The same entity can be announced
/// many times (the scene replays existing objects to new listeners), so
/// upserts must be idempotent.
#[derive(Clone)]
pub struct SceneUpdate {
    pub entity_id: Uuid,
    pub parent_link: i32,
    pub is_killed: bool,
    pub object: Option<Arc<ObjectSnapshot>>,
}

impl SceneUpdate {
    pub fn upsert(object: Arc<ObjectSnapshot>) -> Self {
        Self {
            entity_id: object.id,
            parent_link: LINK_ROOT,
            is_killed: false,
            object: Some(object),
        }
    }

    pub fn killed(entity_id: Uuid) -> Self {
        Self {
            entity_id,
            parent_link: LINK_ROOT,
            is_killed: true,
            object: None,
        }
    }
}
