//! limbforge - headless runs of procedurally generated limbed creatures
//!
//! The creature model, rig and episode loop live in `limbforge-creature`;
//! this crate adds layered run configuration, the episode runner and the
//! JSON run report used by the `limbforge` binary.

pub mod config;
pub mod headless;

// Re-export the core crate
pub use limbforge_creature as creature;

pub use crate::config::{Backend, Overrides, RunConfig};
pub use crate::headless::{EpisodeRunner, EpisodeSummary, RunReport};
