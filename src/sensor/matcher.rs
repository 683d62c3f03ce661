//! Stateless match predicate: one query against one entity
//!
//! The checks run cheapest and most discriminating first, so the common
//! reject costs a key comparison or a bit test, and the geometry runs
//! only for candidates that survive the category filters.

use crate::config::AgentNameMode;
use crate::scene::entity::{sense_flags, EntitySnapshot};
use crate::sensor::query::{SenseOrigin, SensorFilter, SensorQuery};
use crate::util::vec3::Vec3;

/// Full predicate chain for one candidate
pub fn matches(query: &SensorQuery, target: &EntitySnapshot, name_mode: AgentNameMode) -> bool {
    if let Some(key) = query.filter.exact_key {
        if key != target.id {
            return false;
        }
    }

    // A sensor never sees its own NPC or the object hosting its script
    if target.id == query.npc_id || target.id == query.own_object_id {
        return false;
    }

    let mask = query.filter.type_mask;

    if !target.is_agent {
        if target.is_attached {
            return false;
        }
        let physics_ok = (mask & sense_flags::ACTIVE != 0 && target.is_physical)
            || (mask & sense_flags::PASSIVE != 0 && !target.is_physical);
        if !physics_ok {
            return false;
        }
        if !query.filter.name_filter.is_empty() && query.filter.name_filter != target.name {
            return false;
        }
        return check_arc_and_range(&query.origin, &query.filter, target.position);
    }

    if mask & sense_flags::ANY_AGENT == 0 {
        return false;
    }
    if target.is_npc && mask & sense_flags::NPC == 0 {
        return false;
    }
    if !query.filter.name_filter.is_empty()
        && !agent_name_matches(name_mode, &query.filter.name_filter, target)
    {
        return false;
    }
    // Sitting gate only applies when the query filters on activity at all
    if mask & (sense_flags::ACTIVE | sense_flags::PASSIVE) != 0 {
        if target.is_sitting && mask & sense_flags::PASSIVE == 0 {
            return false;
        }
        if !target.is_sitting && mask & sense_flags::ACTIVE == 0 {
            return false;
        }
    }
    check_arc_and_range(&query.origin, &query.filter, target.position)
}

/// Compare a name filter against an agent under one naming convention
fn agent_name_matches(mode: AgentNameMode, filter: &str, target: &EntitySnapshot) -> bool {
    match mode {
        AgentNameMode::DisplayName => filter == target.name,
        AgentNameMode::LegacyResident => {
            if target.last_name.is_empty() {
                filter == format!("{} Resident", target.first_name)
            } else {
                filter == target.name
            }
        }
        AgentNameMode::Username => {
            let expected = if target.last_name.is_empty() {
                format!("{}.resident", target.first_name.to_lowercase())
            } else {
                format!("{}.{}", target.first_name, target.last_name).to_lowercase()
            };
            filter == expected
        }
    }
}

/// Radius and cone test
///
/// The direction cosine is compared against the filter's precomputed
/// cos(arc); acos per candidate would be both slower and unstable near
/// the cone poles. A target exactly at the origin has no direction and
/// counts as in-arc once the radius test passed.
pub fn check_arc_and_range(origin: &SenseOrigin, filter: &SensorFilter, target: Vec3) -> bool {
    let d = target - origin.position;
    let dist_sq = d.length_sq();
    if dist_sq > filter.radius * filter.radius {
        return false;
    }
    if dist_sq <= f32::EPSILON {
        return true;
    }
    let cos_theta = d.dot(origin.forward) / dist_sq.sqrt();
    cos_theta >= filter.arc_cos_threshold()
}

/// Order hits by ascending squared distance from the sense origin
///
/// Stable sort: equidistant entities keep their incoming relative order.
pub fn distance_sorted(origin: Vec3, hits: impl Iterator<Item = EntitySnapshot>) -> Vec<EntitySnapshot> {
    let mut list: Vec<EntitySnapshot> = hits.collect();
    list.sort_by(|a, b| {
        let da = origin.distance_sq_to(a.position);
        let db = origin.distance_sq_to(b.position);
        da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
    });
    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::entity::sense_flags::{
        ACTIVE, AGENT, AGENT_BY_USERNAME, NPC, PASSIVE,
    };
    use crate::sensor::query::SubscriberHandle;
    use crate::testutil::{agent_entity, collect_sink, object_entity};
    use std::f32::consts::PI;
    use uuid::Uuid;

    fn query_with(mask: u32, name: &str, key: Option<Uuid>, radius: f32, arc: f32) -> SensorQuery {
        let (sink, _rx) = collect_sink();
        let sub = SubscriberHandle::new(Uuid::new_v4(), Uuid::new_v4(), sink);
        let filter = SensorFilter::new(mask, key, name.to_string(), radius, arc);
        let mut q = SensorQuery::new(&sub, Uuid::new_v4(), filter, 1.0);
        q.origin = SenseOrigin {
            position: Vec3::ZERO,
            forward: Vec3::UNIT_X,
        };
        q
    }

    #[test]
    fn test_exact_key_mismatch_rejects() {
        let other = Uuid::new_v4();
        let q = query_with(PASSIVE, "", Some(other), 10.0, PI);
        let target = object_entity("rock", Vec3::new(1.0, 0.0, 0.0), false);
        assert!(!matches(&q, &target, AgentNameMode::DisplayName));
    }

    #[test]
    fn test_exact_key_match_accepts() {
        let mut target = object_entity("rock", Vec3::new(1.0, 0.0, 0.0), false);
        target.id = Uuid::new_v4();
        let q = query_with(PASSIVE, "", Some(target.id), 10.0, PI);
        assert!(matches(&q, &target, AgentNameMode::DisplayName));
    }

    #[test]
    fn test_own_npc_excluded() {
        let q = query_with(AGENT, "", None, 10.0, PI);
        let mut target = agent_entity("Ada", "Lovelace", Vec3::new(1.0, 0.0, 0.0));
        target.id = q.npc_id;
        assert!(!matches(&q, &target, AgentNameMode::DisplayName));
    }

    #[test]
    fn test_own_object_excluded() {
        let q = query_with(PASSIVE, "", None, 10.0, PI);
        let mut target = object_entity("home", Vec3::new(1.0, 0.0, 0.0), false);
        target.id = q.own_object_id;
        assert!(!matches(&q, &target, AgentNameMode::DisplayName));
    }

    #[test]
    fn test_attached_object_rejected() {
        let q = query_with(ACTIVE | PASSIVE, "", None, 10.0, PI);
        let mut target = object_entity("hat", Vec3::new(1.0, 0.0, 0.0), false);
        target.is_attached = true;
        assert!(!matches(&q, &target, AgentNameMode::DisplayName));
    }

    #[test]
    fn test_object_physics_bits() {
        let physical = object_entity("ball", Vec3::new(1.0, 0.0, 0.0), true);
        let still = object_entity("rock", Vec3::new(1.0, 0.0, 0.0), false);

        let active_only = query_with(ACTIVE, "", None, 10.0, PI);
        assert!(matches(&active_only, &physical, AgentNameMode::DisplayName));
        assert!(!matches(&active_only, &still, AgentNameMode::DisplayName));

        let passive_only = query_with(PASSIVE, "", None, 10.0, PI);
        assert!(!matches(&passive_only, &physical, AgentNameMode::DisplayName));
        assert!(matches(&passive_only, &still, AgentNameMode::DisplayName));
    }

    #[test]
    fn test_agent_not_sensed_by_object_mask() {
        let q = query_with(ACTIVE | PASSIVE, "", None, 10.0, PI);
        let target = agent_entity("Ada", "Lovelace", Vec3::new(1.0, 0.0, 0.0));
        assert!(!matches(&q, &target, AgentNameMode::DisplayName));
    }

    #[test]
    fn test_object_name_filter() {
        let named = query_with(PASSIVE, "rock", None, 10.0, PI);
        let rock = object_entity("rock", Vec3::new(1.0, 0.0, 0.0), false);
        let tree = object_entity("tree", Vec3::new(1.0, 0.0, 0.0), false);
        assert!(matches(&named, &rock, AgentNameMode::DisplayName));
        assert!(!matches(&named, &tree, AgentNameMode::DisplayName));
    }

    #[test]
    fn test_npc_requires_npc_bit() {
        let mut target = agent_entity("Bot", "Unit", Vec3::new(1.0, 0.0, 0.0));
        target.is_npc = true;

        let agents_only = query_with(AGENT, "", None, 10.0, PI);
        assert!(!matches(&agents_only, &target, AgentNameMode::DisplayName));

        let with_npc = query_with(AGENT | NPC, "", None, 10.0, PI);
        assert!(matches(&with_npc, &target, AgentNameMode::DisplayName));
    }

    #[test]
    fn test_agent_name_modes() {
        let full = agent_entity("Ada", "Lovelace", Vec3::new(1.0, 0.0, 0.0));
        let single = agent_entity("Ada", "", Vec3::new(1.0, 0.0, 0.0));

        assert!(agent_name_matches(AgentNameMode::DisplayName, "Ada Lovelace", &full));
        assert!(!agent_name_matches(AgentNameMode::DisplayName, "Ada Resident", &full));
        assert!(agent_name_matches(AgentNameMode::DisplayName, "Ada", &single));

        assert!(agent_name_matches(AgentNameMode::LegacyResident, "Ada Lovelace", &full));
        assert!(agent_name_matches(AgentNameMode::LegacyResident, "Ada Resident", &single));
        assert!(!agent_name_matches(AgentNameMode::LegacyResident, "Ada", &single));

        assert!(agent_name_matches(AgentNameMode::Username, "ada.lovelace", &full));
        assert!(agent_name_matches(AgentNameMode::Username, "ada.resident", &single));
        assert!(!agent_name_matches(AgentNameMode::Username, "Ada Lovelace", &full));
    }

    #[test]
    fn test_agent_name_filter_applied_through_matches() {
        let q = query_with(AGENT_BY_USERNAME, "ada.lovelace", None, 10.0, PI);
        let ada = agent_entity("Ada", "Lovelace", Vec3::new(1.0, 0.0, 0.0));
        let eve = agent_entity("Eve", "Online", Vec3::new(1.0, 0.0, 0.0));
        assert!(matches(&q, &ada, AgentNameMode::Username));
        assert!(!matches(&q, &eve, AgentNameMode::Username));
    }

    #[test]
    fn test_sitting_gate_with_activity_bits() {
        let mut sitting = agent_entity("Ada", "Lovelace", Vec3::new(1.0, 0.0, 0.0));
        sitting.is_sitting = true;
        let standing = agent_entity("Eve", "Online", Vec3::new(1.0, 0.0, 0.0));

        let active_agents = query_with(AGENT | ACTIVE, "", None, 10.0, PI);
        assert!(!matches(&active_agents, &sitting, AgentNameMode::DisplayName));
        assert!(matches(&active_agents, &standing, AgentNameMode::DisplayName));

        let passive_agents = query_with(AGENT | PASSIVE, "", None, 10.0, PI);
        assert!(matches(&passive_agents, &sitting, AgentNameMode::DisplayName));
        assert!(!matches(&passive_agents, &standing, AgentNameMode::DisplayName));
    }

    #[test]
    fn test_no_sitting_gate_without_activity_bits() {
        let mut sitting = agent_entity("Ada", "Lovelace", Vec3::new(1.0, 0.0, 0.0));
        sitting.is_sitting = true;
        let standing = agent_entity("Eve", "Online", Vec3::new(1.0, 0.0, 0.0));

        let q = query_with(AGENT, "", None, 10.0, PI);
        assert!(matches(&q, &sitting, AgentNameMode::DisplayName));
        assert!(matches(&q, &standing, AgentNameMode::DisplayName));
    }

    #[test]
    fn test_radius_rejects_far_target() {
        let q = query_with(AGENT, "", None, 10.0, PI);
        let near = agent_entity("Ada", "Lovelace", Vec3::new(5.0, 0.0, 0.0));
        let far = agent_entity("Eve", "Online", Vec3::new(20.0, 0.0, 0.0));
        assert!(matches(&q, &near, AgentNameMode::DisplayName));
        assert!(!matches(&q, &far, AgentNameMode::DisplayName));
    }

    #[test]
    fn test_omni_arc_accepts_behind() {
        let q = query_with(AGENT, "", None, 10.0, PI);
        let behind = agent_entity("Ada", "Lovelace", Vec3::new(-5.0, 0.0, 0.0));
        assert!(matches(&q, &behind, AgentNameMode::DisplayName));
    }

    #[test]
    fn test_zero_arc_accepts_only_forward() {
        let q = query_with(AGENT, "", None, 10.0, 0.0);
        let ahead = agent_entity("Ada", "Lovelace", Vec3::new(5.0, 0.0, 0.0));
        let side = agent_entity("Eve", "Online", Vec3::new(0.0, 5.0, 0.0));
        let slightly_off = agent_entity("Sam", "Offaxis", Vec3::new(5.0, 0.1, 0.0));
        assert!(matches(&q, &ahead, AgentNameMode::DisplayName));
        assert!(!matches(&q, &side, AgentNameMode::DisplayName));
        assert!(!matches(&q, &slightly_off, AgentNameMode::DisplayName));
    }

    #[test]
    fn test_narrow_arc_boundary() {
        // Quarter-circle half-angle: 45 degrees off axis is the edge
        let q = query_with(AGENT, "", None, 10.0, PI / 4.0);
        let inside = agent_entity("Ada", "Lovelace", Vec3::new(5.0, 1.0, 0.0));
        let outside = agent_entity("Eve", "Online", Vec3::new(1.0, 5.0, 0.0));
        assert!(matches(&q, &inside, AgentNameMode::DisplayName));
        assert!(!matches(&q, &outside, AgentNameMode::DisplayName));
    }

    #[test]
    fn test_target_at_origin_counts_as_in_arc() {
        let q = query_with(AGENT, "", None, 10.0, 0.0);
        let colocated = agent_entity("Ada", "Lovelace", Vec3::ZERO);
        assert!(matches(&q, &colocated, AgentNameMode::DisplayName));
    }

    #[test]
    fn test_distance_sorted_non_decreasing() {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let entities: Vec<EntitySnapshot> = (0..64)
            .map(|_| {
                agent_entity(
                    "A",
                    "B",
                    Vec3::new(
                        rng.gen_range(-50.0..50.0),
                        rng.gen_range(-50.0..50.0),
                        rng.gen_range(-50.0..50.0),
                    ),
                )
            })
            .collect();

        let origin = Vec3::new(3.0, -2.0, 1.0);
        let sorted = distance_sorted(origin, entities.into_iter());
        for pair in sorted.windows(2) {
            assert!(
                origin.distance_sq_to(pair[0].position) <= origin.distance_sq_to(pair[1].position)
            );
        }
    }
}
