//! Physics interface consumed by the rig builder and the episode loop
//!
//! The creature core never integrates rigid bodies itself. Everything it
//! needs from an engine goes through [`PhysicsBackend`]:
//!
//! - box bodies with mass, pose, gravity flag and rotation lock
//! - motorized hinge joints with angle/velocity readings in degrees
//! - a downward ground probe ([`GroundQuery`])
//!
//! Two backends ship with the crate: [`KinematicWorld`] (no external
//! engine, deterministic) and `RapierWorld` (rapier3d, feature `rapier`).

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::motor::MotorConfig;
use crate::types::{BodyId, JointId};

pub mod kinematic;
#[cfg(feature = "rapier")]
pub mod rapier;

pub use kinematic::KinematicWorld;
#[cfg(feature = "rapier")]
pub use rapier::RapierWorld;

/// Standard gravity along -Y
pub const GRAVITY: f32 = -9.81;

/// Friction and bounciness shared by creature colliders
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceMaterial {
    pub friction: f32,
    pub restitution: f32,
}

impl Default for SurfaceMaterial {
    fn default() -> Self {
        Self {
            friction: 0.6,
            restitution: 0.0,
        }
    }
}

/// What a body is used for (backends use it for collision filtering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyRole {
    Torso,
    Segment,
    Target,
}

/// Description of a dynamic box body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyDesc {
    pub half_extents: Vec3,
    pub mass: f32,
    pub position: Vec3,
    pub rotation: Quat,
    pub gravity: bool,
    /// Keep the body upright (translation only)
    pub lock_rotation: bool,
    pub material: SurfaceMaterial,
    pub role: BodyRole,
}

impl BodyDesc {
    /// Unit box at the origin with gravity
    pub fn new(role: BodyRole, half_extents: Vec3, mass: f32) -> Self {
        Self {
            half_extents,
            mass,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            gravity: true,
            lock_rotation: false,
            material: SurfaceMaterial::default(),
            role,
        }
    }

    pub fn at(mut self, position: Vec3, rotation: Quat) -> Self {
        self.position = position;
        self.rotation = rotation;
        self
    }
}

/// Description of a motorized hinge between two bodies
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointDesc {
    pub parent: BodyId,
    pub child: BodyId,
    /// Anchor in the parent body frame
    pub parent_anchor: Vec3,
    /// Anchor in the child body frame
    pub child_anchor: Vec3,
    /// Hinge axis in the child body frame (unit length)
    pub axis: Vec3,
    pub motor: MotorConfig,
}

/// Kinematic state of a body in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub position: Vec3,
    pub rotation: Quat,
    pub linvel: Vec3,
    pub angvel: Vec3,
}

/// Hinge reading in degrees and degrees/second
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JointReading {
    pub angle: f32,
    pub velocity: f32,
}

/// Distance probe against ground-classified geometry only
pub trait GroundQuery {
    /// Distance along `direction` from `origin` to the first ground hit
    /// within `max_distance`, or `None` if nothing was hit
    fn ground_distance(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<f32>;
}

/// Rigid-body engine operations used by creatures
pub trait PhysicsBackend: GroundQuery {
    fn create_body(&mut self, desc: &BodyDesc) -> BodyId;

    /// Replace shape, mass, flags and pose of an existing body and zero its velocity
    fn reset_body(&mut self, id: BodyId, desc: &BodyDesc) -> Result<()>;

    /// Remove a body along with every joint attached to it
    fn destroy_body(&mut self, id: BodyId);

    fn create_joint(&mut self, desc: &JointDesc) -> Result<JointId>;

    fn set_motor(&mut self, id: JointId, motor: &MotorConfig) -> Result<()>;

    fn body_state(&self, id: BodyId) -> Option<BodyState>;

    fn joint_reading(&self, id: JointId) -> Option<JointReading>;

    /// Teleport a body, zeroing its velocity
    fn set_body_pose(&mut self, id: BodyId, position: Vec3, rotation: Quat) -> Result<()>;

    /// Advance the simulation by `dt` seconds
    fn step(&mut self, dt: f32);

    fn body_count(&self) -> usize;

    fn joint_count(&self) -> usize;
}

/// Signed rotation (radians) of `child` relative to `parent` about `axis`,
/// measured from the relative rotation `rest` captured at joint creation.
///
/// `axis` is expressed in the child frame.
pub fn hinge_angle(parent: Quat, child: Quat, rest: Quat, axis: Vec3) -> f32 {
    let delta = rest.inverse() * (parent.inverse() * child);
    let twist = Vec3::new(delta.x, delta.y, delta.z).dot(axis);
    let angle = 2.0 * twist.atan2(delta.w);
    wrap_angle(angle)
}

/// Wrap an angle into (-PI, PI]
pub fn wrap_angle(angle: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    let mut a = angle.rem_euclid(TAU);
    if a > PI {
        a -= TAU;
    }
    a
}
