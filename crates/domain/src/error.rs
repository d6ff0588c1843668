//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`AreaMediaError`] via `#[from]` (no `String` variants at this level).

/// Top-level error for every fallible operation in the workspace.
#[derive(Debug, thiserror::Error)]
pub enum AreaMediaError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("resolution error")]
    Resolution(#[from] ResolutionError),

    #[error("command failed")]
    Command(#[from] CommandError),

    #[error("subscription error")]
    Subscription(#[from] SubscriptionError),

    /// An opaque failure reported by a host collaborator (directory, state bus, transport).
    #[error("host error")]
    Host(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Domain invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("identifier must not be empty")]
    EmptyId,

    #[error("entity id `{0}` is not namespaced as `<domain>.<object>`")]
    MalformedEntityId(String),

    #[error("an aggregate switch needs at least one member")]
    NoMembers,

    #[error("member `{0}` appears more than once")]
    DuplicateMember(String),

    #[error("state `{0}` can never count as active")]
    InactiveStateMarkedActive(String),
}

/// A lookup that found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} `{id}` not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// Malformed directory data. Always tolerated by dropping the offending entity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("entity `{entity_id}` references unknown device `{device_id}`")]
    UnknownDevice { entity_id: String, device_id: String },

    #[error("entity `{entity_id}` is assigned to unknown area `{area_id}`")]
    UnknownArea { entity_id: String, area_id: String },

    #[error("device lookup for entity `{entity_id}` failed: {reason}")]
    DeviceLookup { entity_id: String, reason: String },
}

/// A single member's `set power` request failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("`{action}` on `{entity_id}` failed: {reason}")]
pub struct CommandError {
    pub entity_id: String,
    pub action: &'static str,
    pub reason: String,
}

/// The state-change channel for a member could not be opened.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot watch `{entity_id}`: {reason}")]
pub struct SubscriptionError {
    pub entity_id: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_validation_error_with_from() {
        let err: AreaMediaError = ValidationError::NoMembers.into();
        assert!(matches!(
            err,
            AreaMediaError::Validation(ValidationError::NoMembers)
        ));
    }

    #[test]
    fn should_display_not_found_with_kind_and_id() {
        let err = NotFoundError {
            entity: "Aggregate",
            id: "area_media_players_kitchen".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Aggregate `area_media_players_kitchen` not found"
        );
    }

    #[test]
    fn should_display_command_error_with_action() {
        let err = CommandError {
            entity_id: "media_player.tv".to_string(),
            action: "turn_on",
            reason: "timeout".to_string(),
        };
        assert_eq!(err.to_string(), "`turn_on` on `media_player.tv` failed: timeout");
    }

    #[test]
    fn should_keep_host_error_as_source() {
        let io = std::io::Error::other("bus closed");
        let err = AreaMediaError::Host(Box::new(io));
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("bus closed"));
    }
}
