//! State-change notifications coming in from the host and switch
//! updates going out to it.

use serde::{Deserialize, Serialize};

use crate::aggregate::SwitchSnapshot;
use crate::entity::PlayerState;
use crate::id::{AggregateId, EntityId};
use crate::time::{Timestamp, now};

/// A member's status changed on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub entity_id: EntityId,
    pub state: PlayerState,
    pub changed_at: Timestamp,
}

impl StateChange {
    /// A change observed now.
    #[must_use]
    pub fn new(entity_id: EntityId, state: PlayerState) -> Self {
        Self::at(entity_id, state, now())
    }

    #[must_use]
    pub fn at(entity_id: EntityId, state: PlayerState, changed_at: Timestamp) -> Self {
        Self {
            entity_id,
            state,
            changed_at,
        }
    }
}

/// What the engine tells the display layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SwitchEvent {
    /// A switch was created or its published state changed.
    Updated { snapshot: SwitchSnapshot },
    /// A previously published switch no longer exists.
    Retracted { unique_id: AggregateId },
}
