//! Domain models for the spy cat agency.
//!
//! # Core Concepts
//!
//! - [`Cat`]: A spy agent. Registered once against the breed catalog, then edited freely.
//! - [`Mission`]: A unit of work holding one to three [`Target`]s and at most one assigned cat.
//!   A cat may be engaged on at most one incomplete mission at a time.
//! - [`Target`]: A sub-objective owned by a mission, completed individually.
//!
//! Completion is one-way for both missions and targets (see [`Progress`]). A mission
//! completes on its own when its last target completes, and completion freezes the
//! mission's and its targets' editable fields.

mod cat;
mod mission;
mod progress;
mod target;

pub use cat::*;
pub use mission::*;
pub use progress::*;
pub use target::*;
