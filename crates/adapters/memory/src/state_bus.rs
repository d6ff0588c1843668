//! Current player states plus change fan-out, all in memory.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use areamedia_app::ports::{StateSink, StateSource};
use areamedia_domain::entity::PlayerState;
use areamedia_domain::error::{AreaMediaError, SubscriptionError};
use areamedia_domain::event::StateChange;
use areamedia_domain::id::EntityId;

#[derive(Debug, Default)]
struct Bus {
    states: HashMap<EntityId, StateChange>,
    watchers: HashMap<EntityId, Vec<(u64, StateSink)>>,
    unwatchable: HashSet<EntityId>,
    next_id: u64,
}

impl Bus {
    fn detach(&mut self, entity_id: &EntityId, id: u64) {
        if let Some(sinks) = self.watchers.get_mut(entity_id) {
            sinks.retain(|(watch_id, _)| *watch_id != id);
            if sinks.is_empty() {
                self.watchers.remove(entity_id);
            }
        }
    }
}

/// Shared, cloneable state bus.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStateBus {
    bus: Arc<Mutex<Bus>>,
}

impl InMemoryStateBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the state of `entity_id` as of now and notify its watchers.
    pub fn set_state(&self, entity_id: impl Into<EntityId>, state: PlayerState) -> StateChange {
        let change = StateChange::new(entity_id.into(), state);
        self.publish(change.clone());
        change
    }

    /// Record `change` as-is and notify watchers, even when it repeats or
    /// predates what is already stored.
    pub fn publish(&self, change: StateChange) {
        let mut bus = self.lock();
        if let Some(sinks) = bus.watchers.get_mut(&change.entity_id) {
            sinks.retain(|(_, sink)| sink.send(change.clone()).is_ok());
        }
        let newer = bus
            .states
            .get(&change.entity_id)
            .is_none_or(|current| current.changed_at <= change.changed_at);
        if newer {
            bus.states.insert(change.entity_id.clone(), change);
        }
    }

    /// Latest recorded state of `entity_id`.
    #[must_use]
    pub fn state(&self, entity_id: &EntityId) -> Option<PlayerState> {
        self.lock()
            .states
            .get(entity_id)
            .map(|change| change.state.clone())
    }

    /// Number of live registrations for `entity_id`.
    #[must_use]
    pub fn watchers(&self, entity_id: &EntityId) -> usize {
        self.lock().watchers.get(entity_id).map_or(0, Vec::len)
    }

    /// Make subscriptions for `entity_id` fail.
    pub fn refuse(&self, entity_id: impl Into<EntityId>) {
        self.lock().unwatchable.insert(entity_id.into());
    }

    fn lock(&self) -> MutexGuard<'_, Bus> {
        self.bus.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One watcher on the bus; dropping it stops deliveries.
#[derive(Debug)]
pub struct BusRegistration {
    entity_id: EntityId,
    id: u64,
    bus: Weak<Mutex<Bus>>,
}

impl Drop for BusRegistration {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .detach(&self.entity_id, self.id);
        }
    }
}

impl StateSource for InMemoryStateBus {
    type Registration = BusRegistration;

    fn current_state(
        &self,
        entity_id: &EntityId,
    ) -> impl Future<Output = Result<Option<StateChange>, AreaMediaError>> + Send {
        let change = self.lock().states.get(entity_id).cloned();
        async { Ok(change) }
    }

    fn subscribe(&self, entity_id: &EntityId, sink: StateSink) -> Result<BusRegistration, AreaMediaError> {
        let mut bus = self.lock();
        if bus.unwatchable.contains(entity_id) {
            return Err(SubscriptionError {
                entity_id: entity_id.to_string(),
                reason: "entity cannot be watched".to_string(),
            }
            .into());
        }
        bus.next_id += 1;
        let id = bus.next_id;
        bus.watchers
            .entry(entity_id.clone())
            .or_default()
            .push((id, sink));
        tracing::trace!(%entity_id, id, "watcher registered");
        Ok(BusRegistration {
            entity_id: entity_id.clone(),
            id,
            bus: Arc::downgrade(&self.bus),
        })
    }
}
