//! Application services — use-case implementations.
//!
//! Each service struct accepts port trait implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete adapters.

pub mod aggregate_builder;
pub mod area_resolver;
pub mod command_dispatcher;
