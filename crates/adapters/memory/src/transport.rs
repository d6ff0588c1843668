//! Simulated media players answering power service calls.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use areamedia_app::ports::PowerTransport;
use areamedia_domain::command::{PowerAction, SERVICE_DOMAIN};
use areamedia_domain::entity::PlayerState;
use areamedia_domain::error::AreaMediaError;
use areamedia_domain::id::EntityId;

use crate::error::MemoryAdapterError;
use crate::state_bus::InMemoryStateBus;

/// Power transport that turns players on and off on an [`InMemoryStateBus`].
///
/// A successful call moves the player to `on` / `off` after the configured
/// latency, which the bus then reports like any other state change.
#[derive(Debug)]
pub struct SimulatedTransport {
    bus: InMemoryStateBus,
    latency: Duration,
    unreachable: Mutex<HashSet<EntityId>>,
    calls: Mutex<Vec<(EntityId, PowerAction)>>,
}

impl SimulatedTransport {
    #[must_use]
    pub fn new(bus: InMemoryStateBus) -> Self {
        Self {
            bus,
            latency: Duration::ZERO,
            unreachable: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Delay every successful call by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make calls to `entity_id` fail, or succeed again.
    pub fn set_unreachable(&self, entity_id: impl Into<EntityId>, unreachable: bool) {
        let entity_id = entity_id.into();
        let mut set = lock(&self.unreachable);
        if unreachable {
            set.insert(entity_id);
        } else {
            set.remove(&entity_id);
        }
    }

    /// Every call received so far, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<(EntityId, PowerAction)> {
        lock(&self.calls).clone()
    }

    fn check(&self, domain: &'static str, action: PowerAction, entity_id: &EntityId) -> Result<(), MemoryAdapterError> {
        if domain != SERVICE_DOMAIN {
            return Err(MemoryAdapterError::UnsupportedService {
                domain,
                service: action.service(),
            });
        }
        if lock(&self.unreachable).contains(entity_id) {
            return Err(MemoryAdapterError::Unreachable(entity_id.clone()));
        }
        if self.bus.state(entity_id).is_none() {
            return Err(MemoryAdapterError::UnknownPlayer(entity_id.clone()));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PowerTransport for SimulatedTransport {
    fn call_service(
        &self,
        domain: &'static str,
        action: PowerAction,
        entity_id: &EntityId,
    ) -> impl Future<Output = Result<(), AreaMediaError>> + Send {
        lock(&self.calls).push((entity_id.clone(), action));
        let checked = self.check(domain, action, entity_id);
        let bus = self.bus.clone();
        let latency = self.latency;
        let entity_id = entity_id.clone();

        async move {
            checked?;
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            let state = if action.is_on() {
                PlayerState::On
            } else {
                PlayerState::Off
            };
            tracing::debug!(%entity_id, %action, "simulated player switched");
            bus.set_state(entity_id, state);
            Ok(())
        }
    }
}
