//! Area resolution: which media players belong to which area.
//!
//! An entity's area is its own direct assignment if present, otherwise the
//! area of its owning device. Entities with neither, or pointing at an area
//! or device the directory does not know, contribute to no aggregate.
//!
//! The output is sorted by area name, then by entity display name
//! (case-insensitive), so that repeated runs over the same snapshot are
//! identical.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::area::Area;
use crate::device::Device;
use crate::entity::MemberEntity;
use crate::error::ResolutionError;
use crate::exclusion::ExclusionSet;
use crate::id::{AreaId, DeviceId, EntityId};

/// One area's matched media players, split by the exclusion set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArea {
    pub area: Area,
    pub included: Vec<MemberEntity>,
    pub excluded: Vec<MemberEntity>,
}

impl ResolvedArea {
    fn new(area: Area) -> Self {
        Self {
            area,
            included: Vec::new(),
            excluded: Vec::new(),
        }
    }

    pub fn included_ids(&self) -> impl Iterator<Item = &EntityId> {
        self.included.iter().map(|entity| &entity.entity_id)
    }

    pub fn excluded_ids(&self) -> impl Iterator<Item = &EntityId> {
        self.excluded.iter().map(|entity| &entity.entity_id)
    }
}

/// A selectable player, as a configuration UI would list it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerChoice {
    pub id: EntityId,
    pub name: String,
}

/// Result of one resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Areas with at least one included member.
    pub areas: Vec<ResolvedArea>,
    /// Areas whose included set is empty (their excluded set may not be).
    pub empty: Vec<ResolvedArea>,
    /// Media players that resolved to no area at all.
    pub unassigned: Vec<EntityId>,
    /// Malformed directory records that were dropped.
    pub issues: Vec<ResolutionError>,
}

impl Resolution {
    /// Every included member across all areas, in area order.
    pub fn all_included(&self) -> impl Iterator<Item = &EntityId> {
        self.areas.iter().flat_map(ResolvedArea::included_ids)
    }

    /// Candidate players per area (included and excluded), keyed by display label.
    ///
    /// Areas without any candidate are left out.
    #[must_use]
    pub fn players_by_area(&self) -> Vec<(String, Vec<PlayerChoice>)> {
        let mut listing: Vec<(String, Vec<PlayerChoice>)> = self
            .areas
            .iter()
            .chain(self.empty.iter())
            .filter(|resolved| !resolved.included.is_empty() || !resolved.excluded.is_empty())
            .map(|resolved| {
                let mut players: Vec<PlayerChoice> = resolved
                    .included
                    .iter()
                    .chain(resolved.excluded.iter())
                    .map(|entity| PlayerChoice {
                        id: entity.entity_id.clone(),
                        name: entity.display_name().to_string(),
                    })
                    .collect();
                players.sort_by(|a, b| {
                    a.name
                        .to_lowercase()
                        .cmp(&b.name.to_lowercase())
                        .then_with(|| a.id.cmp(&b.id))
                });
                (resolved.area.display_label().to_string(), players)
            })
            .collect();
        listing.sort_by(|a, b| a.0.to_lowercase().cmp(&b.0.to_lowercase()).then_with(|| a.0.cmp(&b.0)));
        listing
    }
}

/// Assign every media-player entity to an area and split by exclusion.
///
/// `devices` holds the owning devices that could be looked up; an entity
/// whose device is absent from the map is reported as
/// [`ResolutionError::UnknownDevice`] and dropped.
#[must_use]
pub fn resolve(
    areas: &[Area],
    entities: &[MemberEntity],
    devices: &HashMap<DeviceId, Device>,
    exclusions: &ExclusionSet,
) -> Resolution {
    let mut by_area: HashMap<&AreaId, ResolvedArea> = areas
        .iter()
        .map(|area| (&area.id, ResolvedArea::new(area.clone())))
        .collect();
    let mut resolution = Resolution::default();
    let mut seen: HashSet<&EntityId> = HashSet::new();

    for entity in entities.iter().filter(|entity| entity.is_media_player()) {
        if !seen.insert(&entity.entity_id) {
            continue;
        }

        let area_id = match area_of(entity, devices) {
            Ok(Some(area_id)) => area_id,
            Ok(None) => {
                resolution.unassigned.push(entity.entity_id.clone());
                continue;
            }
            Err(issue) => {
                resolution.issues.push(issue);
                continue;
            }
        };

        let Some(resolved) = by_area.get_mut(area_id) else {
            resolution.issues.push(ResolutionError::UnknownArea {
                entity_id: entity.entity_id.to_string(),
                area_id: area_id.to_string(),
            });
            continue;
        };

        if exclusions.contains(&entity.entity_id) {
            resolved.excluded.push(entity.clone());
        } else {
            resolved.included.push(entity.clone());
        }
    }

    let mut resolved_areas: Vec<ResolvedArea> = by_area.into_values().collect();
    resolved_areas.sort_by(|a, b| {
        a.area
            .display_label()
            .to_lowercase()
            .cmp(&b.area.display_label().to_lowercase())
            .then_with(|| a.area.id.cmp(&b.area.id))
    });

    for mut resolved in resolved_areas {
        sort_by_display_name(&mut resolved.included);
        sort_by_display_name(&mut resolved.excluded);
        if resolved.included.is_empty() {
            resolution.empty.push(resolved);
        } else {
            resolution.areas.push(resolved);
        }
    }

    resolution
}

fn area_of<'a>(
    entity: &'a MemberEntity,
    devices: &'a HashMap<DeviceId, Device>,
) -> Result<Option<&'a AreaId>, ResolutionError> {
    if let Some(area_id) = &entity.area_id {
        return Ok(Some(area_id));
    }
    let Some(device_id) = &entity.device_id else {
        return Ok(None);
    };
    match devices.get(device_id) {
        Some(device) => Ok(device.area_id.as_ref()),
        None => Err(ResolutionError::UnknownDevice {
            entity_id: entity.entity_id.to_string(),
            device_id: device_id.to_string(),
        }),
    }
}

fn sort_by_display_name(entities: &mut [MemberEntity]) {
    entities.sort_by(|a, b| {
        a.display_name()
            .to_lowercase()
            .cmp(&b.display_name().to_lowercase())
            .then_with(|| a.entity_id.cmp(&b.entity_id))
    });
}
