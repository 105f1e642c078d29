//! Target placement

use glam::{Quat, Vec3};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::error::{CreatureError, Result};
use crate::physics::{BodyDesc, BodyRole, PhysicsBackend};
use crate::types::BodyId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Radius of the placement disc around the environment origin
    pub radius: f32,
    /// Spawn height above the environment origin
    pub height: f32,
    /// Edge length of the target cube
    pub size: f32,
    pub mass: f32,
    pub gravity: bool,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            radius: 5.0,
            height: 3.0,
            size: 1.0,
            mass: 1.0,
            gravity: true,
        }
    }
}

impl TargetConfig {
    /// Size and mass must be positive, radius non-negative
    pub fn validate(&self) -> Result<()> {
        let positive = |v: f32| v.is_finite() && v > 0.0;
        if !positive(self.size) || !positive(self.mass) {
            return Err(CreatureError::InvalidConfig(format!(
                "target size and mass must be positive (got {} and {})",
                self.size, self.mass
            )));
        }
        if !(self.radius.is_finite() && self.radius >= 0.0) || !self.height.is_finite() {
            return Err(CreatureError::InvalidConfig(format!(
                "target radius must be non-negative and height finite (got {} and {})",
                self.radius, self.height
            )));
        }
        Ok(())
    }

    /// Uniform point in the placement disc, at spawn height
    pub fn sample_position(&self, origin: Vec3, rng: &mut dyn RngCore) -> Vec3 {
        let r = self.radius * rng.gen::<f32>().sqrt();
        let theta = rng.gen_range(0.0..std::f32::consts::TAU);
        origin + Vec3::new(r * theta.cos(), self.height, r * theta.sin())
    }
}

/// A spawned target body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub body: BodyId,
    pub spawn_position: Vec3,
}

impl Target {
    pub fn spawn<P: PhysicsBackend + ?Sized>(
        config: &TargetConfig,
        origin: Vec3,
        rng: &mut dyn RngCore,
        physics: &mut P,
    ) -> Self {
        let position = config.sample_position(origin, rng);
        let mut desc = BodyDesc::new(BodyRole::Target, Vec3::splat(config.size / 2.0), config.mass)
            .at(position, Quat::IDENTITY);
        desc.gravity = config.gravity;

        let body = physics.create_body(&desc);
        log::debug!("Spawned target {} at {:?}", body, position);

        Target {
            body,
            spawn_position: position,
        }
    }

    /// Current position, or `None` if the body no longer exists
    pub fn position<P: PhysicsBackend + ?Sized>(&self, physics: &P) -> Option<Vec3> {
        physics.body_state(self.body).map(|s| s.position)
    }

    pub fn despawn<P: PhysicsBackend + ?Sized>(self, physics: &mut P) {
        physics.destroy_body(self.body);
    }
}
