//! Area resolver service. Loads the host directory and resolves media
//! players to areas.

use std::collections::{HashMap, HashSet};

use areamedia_domain::error::{AreaMediaError, ResolutionError};
use areamedia_domain::exclusion::ExclusionSet;
use areamedia_domain::id::DeviceId;
use areamedia_domain::resolver::{self, Resolution};

use crate::ports::Directory;

/// Application service producing a [`Resolution`] from the host directory.
pub struct AreaResolver<D> {
    directory: D,
}

impl<D: Directory> AreaResolver<D> {
    /// Create a new resolver reading from the given directory.
    pub fn new(directory: D) -> Self {
        Self { directory }
    }

    /// Resolve every media player to an area and split by `exclusions`.
    ///
    /// Owning devices are only looked up for players without a direct area.
    /// A failed device lookup drops that player and is recorded as a
    /// [`ResolutionError::DeviceLookup`]; it never fails the whole pass.
    ///
    /// # Errors
    ///
    /// Returns the directory error if areas or entities cannot be listed.
    #[tracing::instrument(skip_all, fields(excluded = exclusions.len()))]
    pub async fn resolve(&self, exclusions: &ExclusionSet) -> Result<Resolution, AreaMediaError> {
        let areas = self.directory.list_areas().await?;
        let mut entities = self.directory.list_entities().await?;
        entities.retain(|entity| entity.is_media_player());

        let wanted: HashSet<&DeviceId> = entities
            .iter()
            .filter(|entity| entity.area_id.is_none())
            .filter_map(|entity| entity.device_id.as_ref())
            .collect();

        let mut devices = HashMap::with_capacity(wanted.len());
        let mut failed: HashMap<DeviceId, String> = HashMap::new();
        for device_id in wanted {
            match self.directory.get_device(device_id).await {
                Ok(Some(device)) => {
                    devices.insert(device_id.clone(), device);
                }
                Ok(None) => {}
                Err(err) => {
                    failed.insert(device_id.clone(), err.to_string());
                }
            }
        }

        let mut lookup_issues = Vec::new();
        entities.retain(|entity| {
            let Some(reason) = entity
                .device_id
                .as_ref()
                .filter(|_| entity.area_id.is_none())
                .and_then(|device_id| failed.get(device_id))
            else {
                return true;
            };
            lookup_issues.push(ResolutionError::DeviceLookup {
                entity_id: entity.entity_id.to_string(),
                reason: reason.clone(),
            });
            false
        });

        let mut resolution = resolver::resolve(&areas, &entities, &devices, exclusions);
        resolution.issues.extend(lookup_issues);

        for issue in &resolution.issues {
            tracing::warn!(%issue, "dropping media player with malformed directory data");
        }
        for entity_id in &resolution.unassigned {
            tracing::debug!(%entity_id, "media player has no area");
        }
        tracing::debug!(
            areas = resolution.areas.len(),
            empty = resolution.empty.len(),
            "areas resolved"
        );

        Ok(resolution)
    }
}
