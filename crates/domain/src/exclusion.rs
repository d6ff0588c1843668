//! Member ids the user removed from every aggregate.
//!
//! Excluded entities are never commanded but stay visible in the
//! `excluded_players` attribute of the aggregates they would belong to.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::id::EntityId;

/// User-configured list of excluded entity ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExclusionSet(BTreeSet<EntityId>);

impl ExclusionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, entity_id: &EntityId) -> bool {
        self.0.contains(entity_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Excluded ids in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityId> {
        self.0.iter()
    }
}

impl<T: Into<EntityId>> FromIterator<T> for ExclusionSet {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
