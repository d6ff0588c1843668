//! # areamedia-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** the host integration must implement:
//!   - `Directory` — areas, entities and devices
//!   - `StateSource` — current member states and change notifications
//!   - `PowerTransport` — `turn_on` / `turn_off` service calls
//!   - `SwitchPublisher` — where aggregate switch updates go
//! - Provide the use-case services:
//!   - `AreaResolver` — media player → area resolution
//!   - `AggregateBuilder` — area and global switches from a resolution
//!   - `SubscriptionManager` — per-aggregate state subscriptions
//!   - `CommandDispatcher` — fan-out of power commands
//!   - `AggregateEngine` — ties the above together and owns the live switches
//! - Provide **in-process infrastructure** (switch event bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `areamedia-domain` only (plus `tokio::sync` for channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod aggregate_engine;
pub mod event_bus;
pub mod ports;
pub mod services;
pub mod state_cache;
pub mod subscription;
