//! State source port: current member states and change notifications.

use std::future::Future;

use tokio::sync::mpsc;

use areamedia_domain::error::AreaMediaError;
use areamedia_domain::event::StateChange;
use areamedia_domain::id::EntityId;

/// Channel end the host pushes state changes into.
pub type StateSink = mpsc::UnboundedSender<StateChange>;

/// Host state bus.
pub trait StateSource {
    /// Guard for one registration. Dropping it must stop deliveries for
    /// that registration.
    type Registration: Send + Sync + 'static;

    /// Latest known state of `entity_id`, or `None` if the host has none.
    fn current_state(
        &self,
        entity_id: &EntityId,
    ) -> impl Future<Output = Result<Option<StateChange>, AreaMediaError>> + Send;

    /// Start forwarding every state change of `entity_id` into `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`AreaMediaError::Subscription`] if the host cannot watch
    /// this entity.
    fn subscribe(
        &self,
        entity_id: &EntityId,
        sink: StateSink,
    ) -> Result<Self::Registration, AreaMediaError>;
}

impl<T: StateSource + Send + Sync> StateSource for std::sync::Arc<T> {
    type Registration = T::Registration;

    fn current_state(
        &self,
        entity_id: &EntityId,
    ) -> impl Future<Output = Result<Option<StateChange>, AreaMediaError>> + Send {
        (**self).current_state(entity_id)
    }

    fn subscribe(
        &self,
        entity_id: &EntityId,
        sink: StateSink,
    ) -> Result<Self::Registration, AreaMediaError> {
        (**self).subscribe(entity_id, sink)
    }
}
