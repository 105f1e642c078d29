//! Per-slot motor parameters
//!
//! The [`MotorBank`] holds one [`MotorConfig`] for every joint slot. It is
//! regenerated at the start of each episode and, under policy control,
//! overwritten from the action vector every step.

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::types::{ActionVector, Bounds, JOINT_CAPACITY};

/// Velocity motor settings for one hinge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotorConfig {
    /// Target angular velocity (degrees/second)
    pub target_velocity: f32,
    /// Maximum force the motor may apply
    pub force: f32,
    /// Coast instead of braking when the target velocity is zero
    pub free_spin: bool,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            target_velocity: 0.0,
            force: 1000.0,
            free_spin: false,
        }
    }
}

/// Ranges used when motors are regenerated at episode start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorRanges {
    /// Target velocity range (degrees/second)
    pub velocity: Bounds,
    pub force: Bounds,
    pub free_spin: bool,
}

impl Default for MotorRanges {
    fn default() -> Self {
        Self::scaled_drive()
    }
}

impl MotorRanges {
    /// A uniform [-1, 1] input scaled by 50, full force
    pub fn scaled_drive() -> Self {
        Self {
            velocity: Bounds::new(-50.0, 50.0),
            force: Bounds::fixed(1000.0),
            free_spin: false,
        }
    }

    /// Wider velocity spread with weaker, randomized force
    pub fn bipedal() -> Self {
        Self {
            velocity: Bounds::new(-100.0, 100.0),
            force: Bounds::new(200.0, 400.0),
            free_spin: false,
        }
    }

    pub fn sample(&self, rng: &mut dyn RngCore) -> MotorConfig {
        MotorConfig {
            target_velocity: self.velocity.sample(rng),
            force: self.force.sample(rng),
            free_spin: self.free_spin,
        }
    }
}

/// Motor settings for all joint slots, populated or not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorBank {
    slots: [MotorConfig; JOINT_CAPACITY],
}

impl Default for MotorBank {
    fn default() -> Self {
        Self {
            slots: [MotorConfig::default(); JOINT_CAPACITY],
        }
    }
}

impl MotorBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw fresh settings for every slot
    pub fn regenerate(&mut self, ranges: &MotorRanges, rng: &mut dyn RngCore) {
        for slot in self.slots.iter_mut() {
            *slot = ranges.sample(rng);
        }
        log::debug!(
            "Regenerated {} motor configs (velocity {:.0}..{:.0} deg/s)",
            JOINT_CAPACITY,
            ranges.velocity.min,
            ranges.velocity.max
        );
    }

    pub fn get(&self, slot: usize) -> Option<&MotorConfig> {
        self.slots.get(slot)
    }

    /// Overwrite one slot from a normalized action value
    pub fn apply_action(&mut self, slot: usize, action: f32, velocity_scale: f32, force: f32) {
        if let Some(motor) = self.slots.get_mut(slot) {
            motor.target_velocity = action * velocity_scale;
            motor.force = force;
        }
    }

    /// Overwrite every slot from an action vector
    pub fn set_from_action(&mut self, action: &ActionVector, velocity_scale: f32, force: f32) {
        for (slot, value) in action.iter().enumerate() {
            self.apply_action(slot, *value, velocity_scale, force);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &MotorConfig> {
        self.slots.iter()
    }
}

/// Draw a uniform normalized input in [-1, 1]
pub fn random_input(rng: &mut dyn RngCore) -> f32 {
    rng.gen_range(-1.0..=1.0)
}
