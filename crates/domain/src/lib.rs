//! # areamedia-domain
//!
//! Pure domain model for area media-player aggregation.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Areas**, **Devices** and **Member entities** as read from the host directory
//! - Define **Player states** and which of them count as active
//! - Resolve media players to areas (direct or via owning device) and apply exclusions
//! - Define the **Aggregate switch**: derived on/off, counts, active/inactive lists
//! - Define **Power commands** and their per-member outcomes
//! - Define **Events** flowing in (state changes) and out (switch updates)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies** and performs no IO.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod aggregate;
pub mod area;
pub mod command;
pub mod device;
pub mod entity;
pub mod event;
pub mod exclusion;
pub mod resolver;
