//! Typed identifier newtypes.
//!
//! Host-assigned identifiers (areas, devices, entities, aggregates) are opaque
//! strings. Identifiers minted by this system (subscriptions) are UUIDs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

macro_rules! define_string_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a host-provided identifier.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the raw identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

macro_rules! define_uuid_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(uuid::Uuid);

        impl Default for $name {
            fn default() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Access the inner UUID.
            #[must_use]
            pub fn as_uuid(self) -> uuid::Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_string_id!(
    /// Host identifier of an [`Area`](crate::area::Area).
    AreaId
);

define_string_id!(
    /// Host identifier of a [`Device`](crate::device::Device).
    DeviceId
);

define_string_id!(
    /// Namespaced entity identifier, e.g. `media_player.living_room_tv`.
    EntityId
);

define_string_id!(
    /// Published unique id of an [`AggregateSwitch`](crate::aggregate::AggregateSwitch).
    AggregateId
);

define_uuid_id!(
    /// Handle identifying one aggregate's set of state-change registrations.
    SubscriptionId
);

impl EntityId {
    /// Parse and check the `<domain>.<object>` shape.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyId`] for an empty string and
    /// [`ValidationError::MalformedEntityId`] when either side of the dot is missing.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        if value.is_empty() {
            return Err(ValidationError::EmptyId);
        }
        match value.split_once('.') {
            Some((domain, object)) if !domain.is_empty() && !object.is_empty() => {
                Ok(Self::new(value))
            }
            _ => Err(ValidationError::MalformedEntityId(value.to_string())),
        }
    }

    /// The namespace before the first dot (`media_player` for `media_player.tv`).
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.split_once('.').map_or("", |(domain, _)| domain)
    }
}
