//! The status string a media player reports, and which of
//! those statuses count as "active".

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Status reported by the host for a media player.
///
/// Well-known statuses get their own variant; anything else is kept verbatim
/// in [`Other`](Self::Other).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PlayerState {
    On,
    Off,
    Idle,
    Playing,
    Paused,
    Buffering,
    Standby,
    #[default]
    Unknown,
    Unavailable,
    Other(String),
}

impl PlayerState {
    /// The wire form of this status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Idle => "idle",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Buffering => "buffering",
            Self::Standby => "standby",
            Self::Unknown => "unknown",
            Self::Unavailable => "unavailable",
            Self::Other(raw) => raw,
        }
    }

    /// `off`, `unknown` and `unavailable` can never be classified as active.
    #[must_use]
    pub fn is_never_active(&self) -> bool {
        matches!(self, Self::Off | Self::Unknown | Self::Unavailable)
    }
}

impl From<&str> for PlayerState {
    fn from(raw: &str) -> Self {
        match raw {
            "on" => Self::On,
            "off" => Self::Off,
            "idle" => Self::Idle,
            "playing" => Self::Playing,
            "paused" => Self::Paused,
            "buffering" => Self::Buffering,
            "standby" => Self::Standby,
            "unknown" | "" => Self::Unknown,
            "unavailable" => Self::Unavailable,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for PlayerState {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

impl From<PlayerState> for String {
    fn from(state: PlayerState) -> Self {
        match state {
            PlayerState::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fixed set of statuses that make a member count as active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveStates(BTreeSet<PlayerState>);

impl Default for ActiveStates {
    fn default() -> Self {
        Self(BTreeSet::from([
            PlayerState::On,
            PlayerState::Playing,
            PlayerState::Paused,
            PlayerState::Idle,
            PlayerState::Buffering,
        ]))
    }
}

impl ActiveStates {
    /// Build a custom active set.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InactiveStateMarkedActive`] if the set
    /// contains `off`, `unknown` or `unavailable`.
    pub fn new(states: impl IntoIterator<Item = PlayerState>) -> Result<Self, ValidationError> {
        let set: BTreeSet<PlayerState> = states.into_iter().collect();
        if let Some(bad) = set.iter().find(|state| state.is_never_active()) {
            return Err(ValidationError::InactiveStateMarkedActive(
                bad.as_str().to_string(),
            ));
        }
        Ok(Self(set))
    }

    /// Whether `state` counts as active. An absent state is inactive.
    #[must_use]
    pub fn is_active(&self, state: Option<&PlayerState>) -> bool {
        state.is_some_and(|state| self.0.contains(state))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerState> {
        self.0.iter()
    }
}
