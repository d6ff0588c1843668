//! # areamedia-adapter-memory
//!
//! In-memory host integration that stands in for a real home-automation
//! host, for demonstration and tests.
//!
//! ## Provided pieces
//!
//! | Type | Port | Behaviour |
//! |------|------|-----------|
//! | [`InMemoryDirectory`] | `Directory` | Mutable area / entity / device registry |
//! | [`InMemoryStateBus`] | `StateSource` | Holds current states, fans changes out to registrations |
//! | [`SimulatedTransport`] | `PowerTransport` | Flips player state on `turn_on` / `turn_off`, with failure injection |
//!
//! ## Dependency rule
//!
//! Depends on `areamedia-app` (port traits) and `areamedia-domain` only.

mod directory;
mod error;
mod state_bus;
mod transport;

pub use directory::InMemoryDirectory;
pub use error::MemoryAdapterError;
pub use state_bus::{BusRegistration, InMemoryStateBus};
pub use transport::SimulatedTransport;
