//! Area — a physical location (room, floor, zone) that groups media players.

use serde::{Deserialize, Serialize};

use crate::error::{AreaMediaError, ValidationError};
use crate::id::AreaId;

/// Structural prefix some hosts put in front of generated area names.
const AREA_NAME_PREFIX: &str = "area_";

/// A physical-location grouping as reported by the host directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub id: AreaId,
    pub name: String,
}

impl Area {
    /// Create a builder for constructing an [`Area`].
    #[must_use]
    pub fn builder() -> AreaBuilder {
        AreaBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AreaMediaError::Validation`] when `id` or `name` is empty.
    pub fn validate(&self) -> Result<(), AreaMediaError> {
        if self.id.as_str().is_empty() {
            return Err(ValidationError::EmptyId.into());
        }
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(())
    }

    /// Name shown to users, with a leading `area_` marker removed.
    #[must_use]
    pub fn display_label(&self) -> &str {
        strip_area_prefix(&self.name)
    }
}

/// Remove a case-insensitive `area_` prefix, if present.
///
/// A name that is nothing but the prefix is returned unchanged.
#[must_use]
pub fn strip_area_prefix(name: &str) -> &str {
    match name.get(..AREA_NAME_PREFIX.len()) {
        Some(head) if head.eq_ignore_ascii_case(AREA_NAME_PREFIX) && name.len() > AREA_NAME_PREFIX.len() => {
            &name[AREA_NAME_PREFIX.len()..]
        }
        _ => name,
    }
}

/// Step-by-step builder for [`Area`].
#[derive(Debug, Default)]
pub struct AreaBuilder {
    id: Option<AreaId>,
    name: Option<String>,
}

impl AreaBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<AreaId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Consume the builder, validate, and return an [`Area`].
    ///
    /// # Errors
    ///
    /// Returns [`AreaMediaError::Validation`] if `id` or `name` is missing or empty.
    pub fn build(self) -> Result<Area, AreaMediaError> {
        let area = Area {
            id: self.id.unwrap_or_else(|| AreaId::new("")),
            name: self.name.unwrap_or_default(),
        };
        area.validate()?;
        Ok(area)
    }
}
