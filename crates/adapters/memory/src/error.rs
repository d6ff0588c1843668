//! Errors raised by the simulated host.

use areamedia_domain::error::AreaMediaError;
use areamedia_domain::id::EntityId;

/// Errors originating from the in-memory host.
#[derive(Debug, thiserror::Error)]
pub enum MemoryAdapterError {
    /// The player was marked unreachable.
    #[error("player {0} is unreachable")]
    Unreachable(EntityId),

    /// The player is not known to the directory.
    #[error("unknown player {0}")]
    UnknownPlayer(EntityId),

    /// The directory was taken offline.
    #[error("directory is offline")]
    Offline,

    /// The service is not a power service of the media player domain.
    #[error("unsupported service {domain}.{service}")]
    UnsupportedService {
        domain: &'static str,
        service: &'static str,
    },
}

impl From<MemoryAdapterError> for AreaMediaError {
    fn from(err: MemoryAdapterError) -> Self {
        Self::Host(Box::new(err))
    }
}
