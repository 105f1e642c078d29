//! Fixed-layout observation vector
//!
//! Layout (41 reals):
//!
//! | Range   | Content                                          |
//! |---------|--------------------------------------------------|
//! | 0..3    | torso position relative to the environment origin |
//! | 3..7    | torso rotation quaternion (x, y, z, w)            |
//! | 7..10   | torso linear velocity                             |
//! | 10..13  | torso angular velocity                            |
//! | 13      | ground clearance (probe range if nothing is hit)  |
//! | 14..38  | 12 x (joint angle deg, joint velocity deg/s)      |
//! | 38..41  | target position in the torso frame                |
//!
//! Empty joint slots read (0, 0) and a missing target reads as the zero
//! vector, so the length never changes with the body plan.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::physics::PhysicsBackend;
use crate::rig::Rig;
use crate::target::Target;
use crate::types::JOINT_CAPACITY;

pub const OBSERVATION_LEN: usize = 41;

const POSITION: usize = 0;
const ROTATION: usize = 3;
const LINVEL: usize = 7;
const ANGVEL: usize = 10;
const GROUND: usize = 13;
const JOINTS: usize = 14;
const TARGET: usize = JOINTS + JOINT_CAPACITY * 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Maximum ground probe distance, also reported when nothing is hit
    pub ground_probe_range: f32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            ground_probe_range: 10.0,
        }
    }
}

/// One step's feature vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation([f32; OBSERVATION_LEN]);

impl Default for Observation {
    fn default() -> Self {
        Self([0.0; OBSERVATION_LEN])
    }
}

impl Observation {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn as_array(&self) -> &[f32; OBSERVATION_LEN] {
        &self.0
    }

    pub fn len(&self) -> usize {
        OBSERVATION_LEN
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    fn vec3(&self, at: usize) -> Vec3 {
        Vec3::new(self.0[at], self.0[at + 1], self.0[at + 2])
    }

    fn put_vec3(&mut self, at: usize, v: Vec3) {
        self.0[at..at + 3].copy_from_slice(&v.to_array());
    }

    pub fn torso_position(&self) -> Vec3 {
        self.vec3(POSITION)
    }

    pub fn torso_rotation(&self) -> Quat {
        Quat::from_slice(&self.0[ROTATION..ROTATION + 4])
    }

    pub fn torso_linvel(&self) -> Vec3 {
        self.vec3(LINVEL)
    }

    pub fn torso_angvel(&self) -> Vec3 {
        self.vec3(ANGVEL)
    }

    pub fn ground_clearance(&self) -> f32 {
        self.0[GROUND]
    }

    /// (angle, velocity) of a joint slot in degrees
    pub fn joint(&self, slot: usize) -> (f32, f32) {
        if slot >= JOINT_CAPACITY {
            return (0.0, 0.0);
        }
        let at = JOINTS + slot * 2;
        (self.0[at], self.0[at + 1])
    }

    /// The 24 joint features in slot order
    pub fn joint_features(&self) -> &[f32] {
        &self.0[JOINTS..TARGET]
    }

    pub fn target_local(&self) -> Vec3 {
        self.vec3(TARGET)
    }
}

impl AsRef<[f32]> for Observation {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

/// Build the observation for the current physics state
pub fn assemble<P: PhysicsBackend + ?Sized>(
    physics: &P,
    rig: &Rig,
    target: Option<&Target>,
    origin: Vec3,
    config: &SensorConfig,
) -> Observation {
    let mut obs = Observation::default();
    let torso = physics.body_state(rig.torso());

    if let Some(state) = torso {
        obs.put_vec3(POSITION, state.position - origin);
        obs.0[ROTATION..ROTATION + 4].copy_from_slice(&state.rotation.to_array());
        obs.put_vec3(LINVEL, state.linvel);
        obs.put_vec3(ANGVEL, state.angvel);
    }

    let range = config.ground_probe_range;
    obs.0[GROUND] = torso
        .and_then(|s| physics.ground_distance(s.position, Vec3::NEG_Y, range))
        .unwrap_or(range);

    for slot in 0..JOINT_CAPACITY {
        if let Some(reading) = rig.slot(slot).and_then(|j| physics.joint_reading(j)) {
            let at = JOINTS + slot * 2;
            obs.0[at] = reading.angle;
            obs.0[at + 1] = reading.velocity;
        }
    }

    if let (Some(state), Some(target_pos)) = (torso, target.and_then(|t| t.position(physics))) {
        obs.put_vec3(
            TARGET,
            state.rotation.inverse() * (target_pos - state.position),
        );
    }

    obs
}
