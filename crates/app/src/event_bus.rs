//! In-process switch event bus backed by a tokio broadcast channel.

use std::future::Future;

use tokio::sync::broadcast;

use areamedia_domain::error::AreaMediaError;
use areamedia_domain::event::SwitchEvent;

use crate::ports::SwitchPublisher;

/// In-process bus carrying [`SwitchEvent`]s to display consumers.
///
/// Publishing succeeds even when there are no active subscribers
/// (the event is simply dropped).
pub struct InProcessSwitchBus {
    sender: broadcast::Sender<SwitchEvent>,
}

impl InProcessSwitchBus {
    /// Create a new bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to switch events published *after* this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SwitchEvent> {
        self.sender.subscribe()
    }
}

impl SwitchPublisher for InProcessSwitchBus {
    fn publish(&self, event: SwitchEvent) -> impl Future<Output = Result<(), AreaMediaError>> + Send {
        // send fails only when nobody listens
        let _ = self.sender.send(event);
        async { Ok(()) }
    }
}
