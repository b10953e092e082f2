use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use strata_types::{AreaId, FIXED_AREA_ID};
use tracing::debug;

use crate::area::Area;
use crate::config::HeapStoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::traits::{Store, StoreLock};

/// Heap-resident store.
///
/// Intended for tests and embedding. Area contents live in a `HashMap`
/// behind a `RwLock`; working copies are cloned out on `get_area` and
/// cloned back on `checkout`. Area ids are handed out in increasing order
/// starting at 0 and are never reused.
pub struct HeapStore {
    areas: RwLock<HeapAreas>,
    structure: Mutex<()>,
    config: HeapStoreConfig,
}

struct HeapAreas {
    map: HashMap<AreaId, Vec<u8>>,
    next_id: i64,
    total_bytes: u64,
}

impl HeapStore {
    /// Create an empty, unbounded heap store.
    pub fn new() -> Self {
        Self::with_config(HeapStoreConfig::default())
    }

    /// Create an empty heap store with the given configuration.
    pub fn with_config(config: HeapStoreConfig) -> Self {
        let mut map = HashMap::new();
        map.insert(FIXED_AREA_ID, vec![0u8; config.fixed_area_size]);
        Self {
            areas: RwLock::new(HeapAreas {
                map,
                next_id: 0,
                total_bytes: config.fixed_area_size as u64,
            }),
            structure: Mutex::new(()),
            config,
        }
    }

    /// Number of live areas, including the fixed area.
    pub fn area_count(&self) -> usize {
        self.areas.read().expect("lock poisoned").map.len()
    }

    /// Total capacity in bytes across all live areas.
    pub fn total_bytes(&self) -> u64 {
        self.areas.read().expect("lock poisoned").total_bytes
    }

    /// Returns `true` if `id` names a live area.
    pub fn contains(&self, id: AreaId) -> bool {
        self.areas.read().expect("lock poisoned").map.contains_key(&id)
    }

    pub fn config(&self) -> &HeapStoreConfig {
        &self.config
    }
}

impl Default for HeapStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for HeapStore {
    fn create_area(&self, size: usize) -> StoreResult<Area> {
        let mut areas = self.areas.write().expect("lock poisoned");
        if let Some(limit) = self.config.max_bytes {
            let requested = areas.total_bytes + size as u64;
            if requested > limit {
                return Err(StoreError::CapacityExceeded { requested, limit });
            }
        }
        let id = AreaId::new(areas.next_id);
        areas.next_id += 1;
        areas.total_bytes += size as u64;
        areas.map.insert(id, vec![0u8; size]);
        debug!(area = %id, size, "created area");
        Ok(Area::new(id, vec![0u8; size], false))
    }

    fn get_area(&self, id: AreaId, read_only: bool) -> StoreResult<Area> {
        let areas = self.areas.read().expect("lock poisoned");
        let data = areas.map.get(&id).ok_or(StoreError::AreaNotFound(id))?;
        Ok(Area::new(id, data.clone(), read_only))
    }

    fn checkout(&self, area: &Area) -> StoreResult<()> {
        if area.is_read_only() {
            return Err(StoreError::ReadOnly(area.id()));
        }
        let mut areas = self.areas.write().expect("lock poisoned");
        let slot = areas
            .map
            .get_mut(&area.id())
            .ok_or(StoreError::AreaNotFound(area.id()))?;
        if slot.len() != area.capacity() {
            return Err(StoreError::OutOfBounds {
                id: area.id(),
                position: 0,
                len: area.capacity(),
                capacity: slot.len(),
            });
        }
        slot.copy_from_slice(area.as_bytes());
        Ok(())
    }

    fn delete_area(&self, id: AreaId) -> StoreResult<()> {
        if id.is_fixed() {
            return Err(StoreError::FixedArea);
        }
        let mut areas = self.areas.write().expect("lock poisoned");
        let data = areas.map.remove(&id).ok_or(StoreError::AreaNotFound(id))?;
        areas.total_bytes -= data.len() as u64;
        debug!(area = %id, size = data.len(), "deleted area");
        Ok(())
    }

    fn lock(&self) -> StoreLock<'_> {
        StoreLock::acquire(&self.structure)
    }
}

impl std::fmt::Debug for HeapStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapStore")
            .field("area_count", &self.area_count())
            .field("total_bytes", &self.total_bytes())
            .finish()
    }
}
