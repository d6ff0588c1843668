//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the host.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod directory;
pub mod publisher;
pub mod state_source;
pub mod transport;

pub use directory::Directory;
pub use publisher::SwitchPublisher;
pub use state_source::{StateSink, StateSource};
pub use transport::PowerTransport;
