//! Populates the in-memory host from the `[demo]` topology.

use areamedia_adapter_memory::{InMemoryDirectory, InMemoryStateBus};
use areamedia_domain::area::Area;
use areamedia_domain::device::Device;
use areamedia_domain::entity::{MemberEntity, PlayerState};
use areamedia_domain::error::AreaMediaError;
use areamedia_domain::id::{AreaId, EntityId};

use crate::config::DemoConfig;

/// Register every demo area, device and player and set initial states.
///
/// Returns the number of players registered.
///
/// # Errors
///
/// Returns [`AreaMediaError::Validation`] for an area or player with an
/// empty id or a malformed entity id.
pub fn seed(demo: &DemoConfig, directory: &InMemoryDirectory, bus: &InMemoryStateBus) -> Result<usize, AreaMediaError> {
    for area in &demo.areas {
        directory.add_area(Area::builder().id(area.id.as_str()).name(area.name.as_str()).build()?);
    }
    for device in &demo.devices {
        directory.add_device(Device::new(device.id.as_str(), device.area.as_deref().map(AreaId::from)));
    }
    for player in &demo.players {
        let mut builder = MemberEntity::builder()
            .entity_id(EntityId::parse(&player.entity_id)?)
            .name(player.name.as_str());
        if let Some(area) = &player.area {
            builder = builder.area_id(area.as_str());
        }
        if let Some(device) = &player.device {
            builder = builder.device_id(device.as_str());
        }
        let entity = builder.build()?;
        bus.set_state(entity.entity_id.clone(), PlayerState::from(player.state.as_str()));
        directory.add_entity(entity);
    }
    tracing::info!(
        areas = demo.areas.len(),
        devices = demo.devices.len(),
        players = demo.players.len(),
        "demo host seeded"
    );
    Ok(demo.players.len())
}
