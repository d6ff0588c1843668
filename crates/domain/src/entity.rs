//! Member entity — a media-player entity that can belong to an aggregate.
//!
//! Entities outside the `media_player` namespace are never candidates.

mod state;

pub use state::{ActiveStates, PlayerState};

use serde::{Deserialize, Serialize};

use crate::error::{AreaMediaError, ValidationError};
use crate::id::{AreaId, DeviceId, EntityId};

/// Namespace of the entities this system aggregates.
pub const MEDIA_PLAYER_DOMAIN: &str = "media_player";

/// An entity as listed by the host directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberEntity {
    pub entity_id: EntityId,
    pub name: String,
    pub device_id: Option<DeviceId>,
    pub area_id: Option<AreaId>,
}

impl MemberEntity {
    /// Create a builder for constructing a [`MemberEntity`].
    #[must_use]
    pub fn builder() -> MemberEntityBuilder {
        MemberEntityBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AreaMediaError::Validation`] when the entity id is not
    /// of the form `<domain>.<object>`.
    pub fn validate(&self) -> Result<(), AreaMediaError> {
        EntityId::parse(self.entity_id.as_str())?;
        Ok(())
    }

    /// Whether this entity lives in the media-player namespace.
    #[must_use]
    pub fn is_media_player(&self) -> bool {
        self.entity_id.domain() == MEDIA_PLAYER_DOMAIN
    }

    /// Human-readable name, falling back to the entity id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            self.entity_id.as_str()
        } else {
            &self.name
        }
    }
}

/// Step-by-step builder for [`MemberEntity`].
#[derive(Debug, Default)]
pub struct MemberEntityBuilder {
    entity_id: Option<EntityId>,
    name: Option<String>,
    device_id: Option<DeviceId>,
    area_id: Option<AreaId>,
}

impl MemberEntityBuilder {
    #[must_use]
    pub fn entity_id(mut self, entity_id: impl Into<EntityId>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn device_id(mut self, device_id: impl Into<DeviceId>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    #[must_use]
    pub fn area_id(mut self, area_id: impl Into<AreaId>) -> Self {
        self.area_id = Some(area_id.into());
        self
    }

    /// Consume the builder, validate, and return a [`MemberEntity`].
    ///
    /// # Errors
    ///
    /// Returns [`AreaMediaError::Validation`] if the entity id is missing or malformed.
    pub fn build(self) -> Result<MemberEntity, AreaMediaError> {
        let entity = MemberEntity {
            entity_id: self.entity_id.ok_or(ValidationError::EmptyId)?,
            name: self.name.unwrap_or_default(),
            device_id: self.device_id,
            area_id: self.area_id,
        };
        entity.validate()?;
        Ok(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_build_entity_with_device_and_no_area() {
        let entity = MemberEntity::builder()
            .entity_id("media_player.living_room_tv")
            .name("Living Room TV")
            .device_id("dev-tv")
            .build()
            .unwrap();
        assert!(entity.is_media_player());
        assert!(entity.area_id.is_none());
        assert_eq!(entity.device_id, Some(DeviceId::new("dev-tv")));
    }

    #[test]
    fn should_reject_missing_entity_id() {
        let result = MemberEntity::builder().name("Nameless").build();
        assert!(matches!(
            result,
            Err(AreaMediaError::Validation(ValidationError::EmptyId))
        ));
    }

    #[test]
    fn should_reject_malformed_entity_id() {
        let result = MemberEntity::builder().entity_id("speaker").build();
        assert!(matches!(
            result,
            Err(AreaMediaError::Validation(ValidationError::MalformedEntityId(_)))
        ));
    }

    #[test]
    fn should_not_be_media_player_outside_namespace() {
        let entity = MemberEntity::builder()
            .entity_id("light.kitchen")
            .build()
            .unwrap();
        assert!(!entity.is_media_player());
    }

    #[test]
    fn should_fall_back_to_entity_id_for_display_name() {
        let entity = MemberEntity::builder()
            .entity_id("media_player.den")
            .build()
            .unwrap();
        assert_eq!(entity.display_name(), "media_player.den");
    }
}
