//! Error type for rig construction and episode control

use thiserror::Error;

use crate::lifecycle::EpisodePhase;
use crate::types::{BodyId, JointId};

#[derive(Debug, Error)]
pub enum CreatureError {
    /// A limb asked for a joint slot outside the fixed capacity
    #[error(
        "joint capacity overrun: limb {limb} chain position {chain_position} maps to slot {slot} (capacity {capacity})"
    )]
    CapacityOverrun {
        limb: usize,
        chain_position: usize,
        slot: usize,
        capacity: usize,
    },

    /// Two segments mapped onto the same joint slot
    #[error("joint slot {slot} is already occupied")]
    SlotConflict { slot: usize },

    #[error("invalid body plan: {0}")]
    InvalidPlan(String),

    #[error("invalid environment config: {0}")]
    InvalidConfig(String),

    #[error("physics backend has no body {0}")]
    MissingBody(BodyId),

    #[error("physics backend has no joint {0}")]
    MissingJoint(JointId),

    #[error("episode is not active (phase: {0})")]
    NotActive(EpisodePhase),
}

pub type Result<T> = std::result::Result<T, CreatureError>;
