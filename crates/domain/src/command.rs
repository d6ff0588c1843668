//! Power commands and their per-member outcome.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::CommandError;
use crate::id::EntityId;

/// Service domain every member command is addressed to.
pub const SERVICE_DOMAIN: &str = "media_player";

/// The abstract "set power" request sent to one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerAction {
    TurnOn,
    TurnOff,
}

impl PowerAction {
    #[must_use]
    pub fn from_power(on: bool) -> Self {
        if on { Self::TurnOn } else { Self::TurnOff }
    }

    /// Service name as understood by the host (`turn_on` / `turn_off`).
    #[must_use]
    pub fn service(self) -> &'static str {
        match self {
            Self::TurnOn => "turn_on",
            Self::TurnOff => "turn_off",
        }
    }

    #[must_use]
    pub fn is_on(self) -> bool {
        matches!(self, Self::TurnOn)
    }
}

impl std::fmt::Display for PowerAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.service())
    }
}

/// Result of fanning one command out to every member.
///
/// Partial success is never rolled back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub succeeded: BTreeSet<EntityId>,
    pub failed: BTreeMap<EntityId, String>,
}

impl CommandOutcome {
    pub fn record_success(&mut self, entity_id: EntityId) {
        self.succeeded.insert(entity_id);
    }

    pub fn record_failure(&mut self, err: &CommandError) {
        self.failed
            .insert(EntityId::new(err.entity_id.clone()), err.reason.clone());
    }

    /// Number of members a request was attempted for.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// `true` only if every member succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}
