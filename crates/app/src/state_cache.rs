//! Latest known status per tracked member.
//!
//! Written only from the host state feed; aggregates read it during recompute.

use std::collections::HashMap;

use areamedia_domain::aggregate::LiveStates;
use areamedia_domain::entity::PlayerState;
use areamedia_domain::event::StateChange;
use areamedia_domain::id::EntityId;
use areamedia_domain::time::Timestamp;

#[derive(Debug, Clone)]
struct Entry {
    state: PlayerState,
    changed_at: Timestamp,
}

/// Per-entity status with the time it was last changed on the host.
#[derive(Debug, Default)]
pub struct LiveStateCache {
    entries: HashMap<EntityId, Entry>,
}

impl LiveStateCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `change` unless a strictly newer change is already cached.
    ///
    /// Returns `false` for a stale change.
    pub fn apply(&mut self, change: &StateChange) -> bool {
        match self.entries.get_mut(&change.entity_id) {
            Some(entry) if entry.changed_at > change.changed_at => false,
            Some(entry) => {
                entry.state = change.state.clone();
                entry.changed_at = change.changed_at;
                true
            }
            None => {
                self.entries.insert(
                    change.entity_id.clone(),
                    Entry {
                        state: change.state.clone(),
                        changed_at: change.changed_at,
                    },
                );
                true
            }
        }
    }

    #[must_use]
    pub fn contains(&self, entity_id: &EntityId) -> bool {
        self.entries.contains_key(entity_id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl LiveStates for LiveStateCache {
    fn status(&self, entity_id: &EntityId) -> Option<&PlayerState> {
        self.entries.get(entity_id).map(|entry| &entry.state)
    }
}
