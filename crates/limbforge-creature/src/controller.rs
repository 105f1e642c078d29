//! Actuation and reward
//!
//! Under [`ControlMode::Policy`] every populated joint slot takes its motor
//! command from the action vector each step, and the step is scored by
//! distance to the target. Under [`ControlMode::Static`] motors keep the
//! values drawn at rig build time and nothing is scored.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::motor::MotorBank;
use crate::physics::PhysicsBackend;
use crate::rig::Rig;
use crate::target::Target;
use crate::types::{ActionVector, JOINT_CAPACITY};

/// How motors are driven during an episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ControlMode {
    /// Motors follow the action vector every step; steps are rewarded
    #[default]
    Policy,
    /// Motors keep their episode-start values; no reward, never done
    Static,
}

impl ControlMode {
    pub fn name(&self) -> &'static str {
        match self {
            ControlMode::Policy => "Policy",
            ControlMode::Static => "Static",
        }
    }
}

impl std::fmt::Display for ControlMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ControlMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "policy" | "action" => Ok(ControlMode::Policy),
            "static" | "fixed" => Ok(ControlMode::Static),
            _ => Err(format!("Unknown control mode: {}. Valid: policy, static", s)),
        }
    }
}

/// Actuation scaling and reward shaping constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardConfig {
    /// Action value to target velocity (degrees/second)
    pub velocity_scale: f32,
    /// Motor force applied with every action
    pub motor_force: f32,
    /// Penalty per unit of torso-target distance, every step
    pub distance_penalty: f32,
    /// Constant penalty every step
    pub step_penalty: f32,
    /// Distance below which the target counts as reached
    pub capture_radius: f32,
    pub capture_bonus: f32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            velocity_scale: 50.0,
            motor_force: 1000.0,
            distance_penalty: 0.001,
            step_penalty: 0.001,
            capture_radius: 1.0,
            capture_bonus: 1.0,
        }
    }
}

impl RewardConfig {
    /// Score one step given the torso-target distance (if any)
    pub fn evaluate(&self, distance: Option<f32>) -> StepOutcome {
        let mut outcome = StepOutcome {
            reward: -self.step_penalty,
            distance,
            ..Default::default()
        };

        if let Some(d) = distance {
            outcome.reward -= d * self.distance_penalty;
            if d < self.capture_radius {
                outcome.reward += self.capture_bonus;
                outcome.done = true;
                outcome.captured = true;
            }
        }

        outcome
    }
}

/// Result of one control step
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepOutcome {
    pub reward: f32,
    pub done: bool,
    /// The target was reached this step
    pub captured: bool,
    /// Torso-target distance after integration
    pub distance: Option<f32>,
}

/// Write the action into the motor bank and push it to every live joint.
///
/// Empty slots are skipped. Does nothing under [`ControlMode::Static`].
pub fn actuate<P: PhysicsBackend + ?Sized>(
    mode: ControlMode,
    action: &ActionVector,
    rig: &Rig,
    motors: &mut MotorBank,
    config: &RewardConfig,
    physics: &mut P,
) -> Result<()> {
    if mode == ControlMode::Static {
        return Ok(());
    }

    for (slot, value) in action.iter().enumerate().take(JOINT_CAPACITY) {
        let Some(joint) = rig.slot(slot) else {
            continue;
        };
        motors.apply_action(slot, *value, config.velocity_scale, config.motor_force);
        if let Some(motor) = motors.get(slot) {
            physics.set_motor(joint, motor)?;
        }
    }
    Ok(())
}

/// Distance from the torso to the target, if both exist
pub fn target_distance<P: PhysicsBackend + ?Sized>(
    physics: &P,
    rig: &Rig,
    target: Option<&Target>,
) -> Option<f32> {
    let torso = physics.body_state(rig.torso())?.position;
    let target = target?.position(physics)?;
    Some(torso.distance(target))
}

/// Score the post-integration state
pub fn score<P: PhysicsBackend + ?Sized>(
    mode: ControlMode,
    physics: &P,
    rig: &Rig,
    target: Option<&Target>,
    config: &RewardConfig,
) -> StepOutcome {
    let distance = target_distance(physics, rig, target);
    match mode {
        ControlMode::Policy => config.evaluate(distance),
        ControlMode::Static => StepOutcome {
            distance,
            ..Default::default()
        },
    }
}
