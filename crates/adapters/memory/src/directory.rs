//! Mutable in-memory area / entity / device registry.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use areamedia_app::ports::Directory;
use areamedia_domain::area::Area;
use areamedia_domain::device::Device;
use areamedia_domain::entity::MemberEntity;
use areamedia_domain::error::AreaMediaError;
use areamedia_domain::id::{AreaId, DeviceId, EntityId};

use crate::error::MemoryAdapterError;

#[derive(Debug, Default)]
struct Registry {
    areas: BTreeMap<AreaId, Area>,
    entities: BTreeMap<EntityId, MemberEntity>,
    devices: HashMap<DeviceId, Device>,
    offline: bool,
}

/// Host directory kept in memory.
///
/// Every mutation is visible to the next listing; the aggregate engine only
/// picks changes up on its next rebuild.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    registry: RwLock<Registry>,
}

impl InMemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an area.
    pub fn add_area(&self, area: Area) {
        self.write().areas.insert(area.id.clone(), area);
    }

    /// Insert or replace an entity.
    pub fn add_entity(&self, entity: MemberEntity) {
        self.write().entities.insert(entity.entity_id.clone(), entity);
    }

    /// Insert or replace a device.
    pub fn add_device(&self, device: Device) {
        self.write().devices.insert(device.id.clone(), device);
    }

    /// Remove an entity. Returns `false` if it was not registered.
    pub fn remove_entity(&self, entity_id: &EntityId) -> bool {
        self.write().entities.remove(entity_id).is_some()
    }

    /// Change the direct area of an entity. Returns `false` if it is unknown.
    pub fn move_entity(&self, entity_id: &EntityId, area_id: Option<AreaId>) -> bool {
        match self.write().entities.get_mut(entity_id) {
            Some(entity) => {
                entity.area_id = area_id;
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn contains_entity(&self, entity_id: &EntityId) -> bool {
        self.read().entities.contains_key(entity_id)
    }

    /// Make every listing fail until set back to `false`.
    pub fn set_offline(&self, offline: bool) {
        self.write().offline = offline;
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn online(&self) -> Result<RwLockReadGuard<'_, Registry>, AreaMediaError> {
        let registry = self.read();
        if registry.offline {
            return Err(MemoryAdapterError::Offline.into());
        }
        Ok(registry)
    }
}

impl Directory for InMemoryDirectory {
    fn list_areas(&self) -> impl Future<Output = Result<Vec<Area>, AreaMediaError>> + Send {
        let result = self
            .online()
            .map(|registry| registry.areas.values().cloned().collect());
        async { result }
    }

    fn list_entities(&self) -> impl Future<Output = Result<Vec<MemberEntity>, AreaMediaError>> + Send {
        let result = self
            .online()
            .map(|registry| registry.entities.values().cloned().collect());
        async { result }
    }

    fn get_device(&self, id: &DeviceId) -> impl Future<Output = Result<Option<Device>, AreaMediaError>> + Send {
        let result = self
            .online()
            .map(|registry| registry.devices.get(id).cloned());
        async { result }
    }
}
