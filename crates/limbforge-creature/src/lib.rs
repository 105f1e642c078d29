//! Procedurally generated limbed creatures for locomotion learning
//!
//! This crate implements:
//! - Body plan generation (free-ranging random limbs, symmetric bipeds)
//! - Rig construction: box segments joined by motorized hinges in 12 fixed slots
//! - A 41-value observation vector with a fixed layout
//! - Actuation, reward shaping and termination for a reach-the-target task
//! - The episode lifecycle that regenerates creature and target
//! - A physics interface with a kinematic backend and a rapier3d backend

pub mod actions;
pub mod body_plan;
pub mod controller;
pub mod error;
pub mod lifecycle;
pub mod motor;
pub mod observation;
pub mod physics;
pub mod rig;
pub mod target;
pub mod types;

use glam::{Quat, Vec3};

// Re-export main types for convenience
pub use actions::{ActionSource, ConstantActions, RandomActions};
pub use body_plan::{
    BipedalPlan, BodyPlanPolicy, CreatureSpec, FreeRangingPlan, GenerationPolicy, LimbSpec,
    PlanVariant, SegmentSpec, TorsoDims,
};
pub use controller::{ControlMode, RewardConfig, StepOutcome};
pub use error::CreatureError;
pub use lifecycle::{CreatureEnv, EnvConfig, EpisodePhase};
pub use motor::{MotorBank, MotorConfig, MotorRanges};
pub use observation::{Observation, SensorConfig, OBSERVATION_LEN};
pub use physics::{GroundQuery, KinematicWorld, PhysicsBackend, SurfaceMaterial};
#[cfg(feature = "rapier")]
pub use physics::RapierWorld;
pub use rig::{Rig, RigConfig};
pub use target::{Target, TargetConfig};
pub use types::{ActionVector, BodyId, JointId, Rgba, JOINT_CAPACITY};

/// Render data for a single box
#[derive(Debug, Clone)]
pub struct BoxRenderData {
    pub position: Vec3,
    pub rotation: Quat,
    pub half_extents: Vec3,
    pub color: Rgba,
}

/// Render data for an entire creature (torso first)
#[derive(Debug, Clone, Default)]
pub struct CreatureRenderData {
    pub boxes: Vec<BoxRenderData>,
}
