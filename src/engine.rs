//! Engine front door: per-region sensing services keyed by region id

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::config::SensorConfig;
use crate::error::SensorError;
use crate::region::RegionSensors;
use crate::scene::entity::NpcResolver;

/// Owns one `RegionSensors` per registered region
///
/// Regions register when they come up and deregister on teardown; there is
/// no process-wide sensing state outside this map.
pub struct SensorEngine {
    regions: RwLock<HashMap<Uuid, Arc<RegionSensors>>>,
}

impl SensorEngine {
    pub fn new() -> Self {
        Self {
            regions: RwLock::new(HashMap::new()),
        }
    }

    /// Create sensing services for a region and start its background work
    pub fn register_region(
        &self,
        region_id: Uuid,
        npcs: Arc<dyn NpcResolver>,
        config: SensorConfig,
    ) -> Result<Arc<RegionSensors>, SensorError> {
        config.validate()?;
        let mut regions = self.regions.write();
        if regions.contains_key(&region_id) {
            return Err(SensorError::RegionExists(region_id));
        }
        let region = Arc::new(RegionSensors::new(region_id, npcs, config)?);
        regions.insert(region_id, region.clone());
        tracing::info!(region = %region_id, "region sensors registered");
        Ok(region)
    }

    /// Tear down and forget a region's sensing services
    ///
    /// Returns false when the region was never registered.
    pub fn deregister_region(&self, region_id: Uuid) -> bool {
        let region = self.regions.write().remove(&region_id);
        match region {
            Some(region) => {
                region.teardown();
                true
            }
            None => false,
        }
    }

    pub fn region(&self, region_id: Uuid) -> Option<Arc<RegionSensors>> {
        self.regions.read().get(&region_id).cloned()
    }

    pub fn region_count(&self) -> usize {
        self.regions.read().len()
    }
}

impl Default for SensorEngine {
    fn default() -> Self {
        Self::new()
    }
}
