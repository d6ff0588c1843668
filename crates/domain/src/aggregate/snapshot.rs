//! Published view of an aggregate switch.

use serde::{Deserialize, Serialize};

use crate::id::{AggregateId, EntityId};

use super::{AggregateSwitch, Scope};

const ICON_ON: &str = "mdi:monitor-speaker";
const ICON_OFF: &str = "mdi:monitor-speaker-off";

/// Attribute bundle attached to a published switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchAttributes {
    pub count: usize,
    pub of: usize,
    pub count_of: String,
    pub players_active: Vec<EntityId>,
    pub players_inactive: Vec<EntityId>,
    pub excluded_players: Vec<EntityId>,
}

/// Everything the host needs to display one aggregate switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchSnapshot {
    pub unique_id: AggregateId,
    pub name: String,
    pub scope: Scope,
    pub is_on: bool,
    pub icon: String,
    pub attributes: SwitchAttributes,
}

impl SwitchSnapshot {
    pub(super) fn from_switch(switch: &AggregateSwitch) -> Self {
        let is_on = switch.displayed_on();
        Self {
            unique_id: switch.id().clone(),
            name: switch.name(),
            scope: switch.scope().clone(),
            is_on,
            icon: if is_on { ICON_ON } else { ICON_OFF }.to_string(),
            attributes: SwitchAttributes {
                count: switch.active_count(),
                of: switch.total_count(),
                count_of: format!("{}/{}", switch.active_count(), switch.total_count()),
                players_active: switch.active_members().to_vec(),
                players_inactive: switch.inactive_members().to_vec(),
                excluded_players: switch.excluded().to_vec(),
            },
        }
    }
}
