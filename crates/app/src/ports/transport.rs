//! Power transport port: how a single member is physically switched.

use std::future::Future;

use areamedia_domain::command::PowerAction;
use areamedia_domain::error::AreaMediaError;
use areamedia_domain::id::EntityId;

/// Issues one service call against one entity.
pub trait PowerTransport {
    /// Call `<domain>.<action>` for `entity_id`.
    ///
    /// # Errors
    ///
    /// Any error is treated as a failure of this member only.
    fn call_service(
        &self,
        domain: &'static str,
        action: PowerAction,
        entity_id: &EntityId,
    ) -> impl Future<Output = Result<(), AreaMediaError>> + Send;
}

impl<T: PowerTransport + Send + Sync> PowerTransport for std::sync::Arc<T> {
    fn call_service(
        &self,
        domain: &'static str,
        action: PowerAction,
        entity_id: &EntityId,
    ) -> impl Future<Output = Result<(), AreaMediaError>> + Send {
        (**self).call_service(domain, action, entity_id)
    }
}
