//! Switch publisher port — pushes aggregate updates to the display layer.

use std::future::Future;

use areamedia_domain::error::AreaMediaError;
use areamedia_domain::event::SwitchEvent;

/// Publishes switch updates and retractions to interested consumers.
pub trait SwitchPublisher {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: SwitchEvent)
    -> impl Future<Output = Result<(), AreaMediaError>> + Send;
}

impl<T: SwitchPublisher + Send + Sync> SwitchPublisher for std::sync::Arc<T> {
    fn publish(
        &self,
        event: SwitchEvent,
    ) -> impl Future<Output = Result<(), AreaMediaError>> + Send {
        (**self).publish(event)
    }
}
