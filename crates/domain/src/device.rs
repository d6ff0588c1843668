//! Device — a physical or virtual thing that owns one or more entities.
//!
//! Only the area assignment matters here: an entity without its own area
//! inherits the area of its owning device.

use serde::{Deserialize, Serialize};

use crate::id::{AreaId, DeviceId};

/// Directory record for a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub area_id: Option<AreaId>,
}

impl Device {
    #[must_use]
    pub fn new(id: impl Into<DeviceId>, area_id: Option<AreaId>) -> Self {
        Self {
            id: id.into(),
            area_id,
        }
    }
}
