//! Fans one power command out to every member of an aggregate.
//!
//! Requests are started together and all of them are awaited; one member's
//! failure never prevents the others from being attempted.

use std::sync::Arc;

use futures_util::future::join_all;

use areamedia_domain::command::{CommandOutcome, PowerAction, SERVICE_DOMAIN};
use areamedia_domain::error::{AreaMediaError, CommandError};
use areamedia_domain::id::EntityId;

use crate::ports::PowerTransport;

/// Sends `turn_on` / `turn_off` to members through a [`PowerTransport`].
pub struct CommandDispatcher<T> {
    transport: Arc<T>,
}

impl<T> Clone for CommandDispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: PowerTransport> CommandDispatcher<T> {
    /// Create a new dispatcher backed by the given transport.
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    /// Issue `action` to every member and collect per-member outcomes.
    #[tracing::instrument(skip(self, members), fields(members = members.len()))]
    pub async fn dispatch(&self, members: &[EntityId], action: PowerAction) -> CommandOutcome {
        let requests = members.iter().map(|entity_id| async move {
            let result = self
                .transport
                .call_service(SERVICE_DOMAIN, action, entity_id)
                .await;
            (entity_id, result)
        });

        let mut outcome = CommandOutcome::default();
        for (entity_id, result) in join_all(requests).await {
            match result {
                Ok(()) => outcome.record_success(entity_id.clone()),
                Err(err) => {
                    let failure = CommandError {
                        entity_id: entity_id.to_string(),
                        action: action.service(),
                        reason: describe(&err),
                    };
                    tracing::warn!(%failure, "member command failed");
                    outcome.record_failure(&failure);
                }
            }
        }

        tracing::debug!(
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "command dispatched"
        );
        outcome
    }
}

/// Error message followed by its source chain.
fn describe(err: &AreaMediaError) -> String {
    let mut reason = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        reason.push_str(": ");
        reason.push_str(&cause.to_string());
        source = std::error::Error::source(cause);
    }
    reason
}
