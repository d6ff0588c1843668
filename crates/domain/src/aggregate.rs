//! Aggregate switch — one derived on/off control over a set of media players.
//!
//! An aggregate is either scoped to a single area or global (the union of
//! every area's included members). Both behave identically; the scope only
//! changes the published name and unique id.
//!
//! After every [`recompute`](AggregateSwitch::recompute):
//! - `active_count() == active_members().len()`
//! - `total_count() == members().len()`
//! - `is_on() == (active_count() > 0)`
//! - active and inactive members partition `members()`

mod snapshot;

pub use snapshot::{SwitchAttributes, SwitchSnapshot};

use std::collections::HashMap;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::entity::{ActiveStates, PlayerState};
use crate::error::{AreaMediaError, ValidationError};
use crate::id::{AggregateId, AreaId, EntityId};

/// Prefix shared by every published unique id.
pub const UNIQUE_ID_PREFIX: &str = "area_media_players";

/// What an aggregate covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scope {
    Area { area_id: AreaId },
    Global,
}

/// Read access to the latest known status of each entity.
pub trait LiveStates {
    fn status(&self, entity_id: &EntityId) -> Option<&PlayerState>;
}

impl LiveStates for HashMap<EntityId, PlayerState> {
    fn status(&self, entity_id: &EntityId) -> Option<&PlayerState> {
        self.get(entity_id)
    }
}

/// Derived on/off state over a fixed member set.
#[derive(Debug, Clone)]
pub struct AggregateSwitch {
    id: AggregateId,
    scope: Scope,
    label: String,
    members: Vec<EntityId>,
    excluded: Vec<EntityId>,
    active_members: Vec<EntityId>,
    inactive_members: Vec<EntityId>,
    derived_on: bool,
    assumed_on: Option<bool>,
}

impl AggregateSwitch {
    /// Create a builder for constructing an [`AggregateSwitch`].
    #[must_use]
    pub fn builder() -> AggregateSwitchBuilder {
        AggregateSwitchBuilder::default()
    }

    #[must_use]
    pub fn id(&self) -> &AggregateId {
        &self.id
    }

    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Published display name.
    #[must_use]
    pub fn name(&self) -> String {
        match self.scope {
            Scope::Area { .. } => format!("Media Players {}", self.label),
            Scope::Global => "All Area Media Players".to_string(),
        }
    }

    #[must_use]
    pub fn members(&self) -> &[EntityId] {
        &self.members
    }

    #[must_use]
    pub fn excluded(&self) -> &[EntityId] {
        &self.excluded
    }

    #[must_use]
    pub fn active_members(&self) -> &[EntityId] {
        &self.active_members
    }

    #[must_use]
    pub fn inactive_members(&self) -> &[EntityId] {
        &self.inactive_members
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active_members.len()
    }

    #[must_use]
    pub fn total_count(&self) -> usize {
        self.members.len()
    }

    /// Derived state: at least one member is active.
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.derived_on
    }

    /// Value shown to users: the last commanded intent until the next
    /// recompute, otherwise the derived state.
    #[must_use]
    pub fn displayed_on(&self) -> bool {
        self.assumed_on.unwrap_or(self.derived_on)
    }

    /// Pending optimistic value set by the last command, if any.
    #[must_use]
    pub fn assumed_on(&self) -> Option<bool> {
        self.assumed_on
    }

    #[must_use]
    pub fn contains(&self, entity_id: &EntityId) -> bool {
        self.members.contains(entity_id)
    }

    /// Reclassify every member from `live`. Members with no known status
    /// count as inactive.
    ///
    /// Returns `true` when anything observable changed.
    pub fn recompute(&mut self, live: &impl LiveStates, active_states: &ActiveStates) -> bool {
        let (active, inactive): (Vec<EntityId>, Vec<EntityId>) = self
            .members
            .iter()
            .cloned()
            .partition(|member| active_states.is_active(live.status(member)));

        let derived_on = !active.is_empty();
        let changed = active != self.active_members
            || derived_on != self.derived_on
            || self.assumed_on.is_some_and(|assumed| assumed != derived_on);

        self.active_members = active;
        self.inactive_members = inactive;
        self.derived_on = derived_on;
        self.assumed_on = None;
        changed
    }

    /// Record the intent of a power command until fresh states arrive.
    pub fn assume_power(&mut self, on: bool) {
        self.assumed_on = Some(on);
    }

    /// Published view of this switch.
    #[must_use]
    pub fn snapshot(&self) -> SwitchSnapshot {
        SwitchSnapshot::from_switch(self)
    }
}

/// Lowercase label with spaces replaced by underscores.
#[must_use]
pub fn slugify(label: &str) -> String {
    label.to_lowercase().replace(' ', "_")
}

/// Step-by-step builder for [`AggregateSwitch`].
#[derive(Debug, Default)]
pub struct AggregateSwitchBuilder {
    scope: Option<Scope>,
    label: Option<String>,
    members: Vec<EntityId>,
    excluded: Vec<EntityId>,
}

impl AggregateSwitchBuilder {
    /// Scope the switch to one area, labelled with the area's display name.
    #[must_use]
    pub fn area(mut self, area_id: AreaId, label: impl Into<String>) -> Self {
        self.scope = Some(Scope::Area { area_id });
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn global(mut self) -> Self {
        self.scope = Some(Scope::Global);
        self.label = Some("All".to_string());
        self
    }

    #[must_use]
    pub fn members(mut self, members: impl IntoIterator<Item = EntityId>) -> Self {
        self.members = members.into_iter().collect();
        self
    }

    #[must_use]
    pub fn excluded(mut self, excluded: impl IntoIterator<Item = EntityId>) -> Self {
        self.excluded = excluded.into_iter().collect();
        self
    }

    /// Consume the builder, validate, and return an [`AggregateSwitch`].
    ///
    /// The switch starts off with every member inactive.
    ///
    /// # Errors
    ///
    /// Returns [`AreaMediaError::Validation`] if the label is empty, the
    /// member set is empty, or a member is listed twice.
    pub fn build(self) -> Result<AggregateSwitch, AreaMediaError> {
        let scope = self.scope.unwrap_or(Scope::Global);
        let label = self.label.unwrap_or_default();
        if label.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.members.is_empty() {
            return Err(ValidationError::NoMembers.into());
        }
        let mut seen = HashSet::with_capacity(self.members.len());
        if let Some(dup) = self.members.iter().find(|member| !seen.insert(*member)) {
            return Err(ValidationError::DuplicateMember(dup.to_string()).into());
        }

        let id = match scope {
            Scope::Area { .. } => AggregateId::new(format!("{UNIQUE_ID_PREFIX}_{}", slugify(&label))),
            Scope::Global => AggregateId::new(format!("{UNIQUE_ID_PREFIX}_all")),
        };

        Ok(AggregateSwitch {
            id,
            scope,
            label,
            inactive_members: self.members.clone(),
            members: self.members,
            excluded: self.excluded,
            active_members: Vec::new(),
            derived_on: false,
            assumed_on: None,
        })
    }
}
