//! Episode lifecycle
//!
//! [`CreatureEnv`] owns the physics backend, the RNG, the motor bank, the
//! current rig and the target, and moves through
//! `Idle -> Generating -> Active -> Terminating -> Generating -> ...`.
//!
//! - `reset()` tears down the previous rig and target, redraws motors,
//!   generates a fresh body plan, builds it and spawns a target
//! - `step()` actuates, integrates physics, scores the new state and ends
//!   the episode when the controller says so
//! - `end_episode()` is the external end signal (step budget)
//!
//! With `auto_reset` (the default) a terminated episode immediately
//! regenerates. The torso body persists across episodes.

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use serde::{Deserialize, Serialize};

use crate::body_plan::{BodyPlanPolicy, GenerationPolicy, PlanVariant, TorsoDims};
use crate::controller::{actuate, score, ControlMode, RewardConfig, StepOutcome};
use crate::error::{CreatureError, Result};
use crate::motor::{MotorBank, MotorRanges};
use crate::observation::{assemble, Observation, SensorConfig};
use crate::physics::PhysicsBackend;
use crate::rig::{build_rig, torso_desc, Rig, RigConfig};
use crate::target::{Target, TargetConfig};
use crate::types::{ActionVector, BodyId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EpisodePhase {
    /// No episode has started yet
    Idle,
    /// Tearing down and rebuilding the creature
    Generating,
    /// Accepting steps
    Active,
    /// Episode ended, waiting for a reset
    Terminating,
}

impl EpisodePhase {
    pub fn name(&self) -> &'static str {
        match self {
            EpisodePhase::Idle => "Idle",
            EpisodePhase::Generating => "Generating",
            EpisodePhase::Active => "Active",
            EpisodePhase::Terminating => "Terminating",
        }
    }
}

impl std::fmt::Display for EpisodePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Everything that parameterizes an environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvConfig {
    pub generation: GenerationPolicy,
    pub control: ControlMode,
    pub motors: MotorRanges,
    pub rig: RigConfig,
    pub sensors: SensorConfig,
    pub reward: RewardConfig,
    pub target: TargetConfig,
    /// Environment origin in world space
    pub origin: Vec3,
    /// Seconds per physics step
    pub timestep: f32,
    /// Physics steps per control step
    pub substeps: u32,
    /// Regenerate immediately when an episode ends
    pub auto_reset: bool,
    /// RNG seed (random if not set)
    pub seed: Option<u64>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::free_ranging()
    }
}

impl EnvConfig {
    /// Random limbs driven by a policy, rewarded for reaching the target
    pub fn free_ranging() -> Self {
        Self {
            generation: GenerationPolicy::from_variant(PlanVariant::FreeRanging),
            control: ControlMode::Policy,
            motors: MotorRanges::scaled_drive(),
            rig: RigConfig::default(),
            sensors: SensorConfig::default(),
            reward: RewardConfig::default(),
            target: TargetConfig::default(),
            origin: Vec3::ZERO,
            timestep: 0.02,
            substeps: 1,
            auto_reset: true,
            seed: None,
        }
    }

    /// Two legs and two arms with motors fixed for the whole episode
    pub fn bipedal() -> Self {
        Self {
            generation: GenerationPolicy::from_variant(PlanVariant::Bipedal),
            control: ControlMode::Static,
            motors: MotorRanges::bipedal(),
            ..Self::free_ranging()
        }
    }

    /// Preset matching a plan variant
    pub fn for_variant(variant: PlanVariant) -> Self {
        match variant {
            PlanVariant::FreeRanging => Self::free_ranging(),
            PlanVariant::Bipedal => Self::bipedal(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.generation.validate()?;
        self.rig.validate()?;
        self.target.validate()?;
        if !self.timestep.is_finite() || self.timestep <= 0.0 || self.substeps == 0 {
            return Err(CreatureError::InvalidConfig(format!(
                "timestep must be positive with at least one substep (got {} x {})",
                self.timestep, self.substeps
            )));
        }
        Ok(())
    }
}

/// Procedural creature environment driven one control step at a time
pub struct CreatureEnv<P: PhysicsBackend> {
    config: EnvConfig,
    policy: Box<dyn BodyPlanPolicy>,
    physics: P,
    rng: Xoshiro256StarStar,
    motors: MotorBank,
    torso: BodyId,
    rig: Option<Rig>,
    target: Option<Target>,
    phase: EpisodePhase,
    episode: u64,
    steps: u64,
    episode_reward: f32,
}

impl<P: PhysicsBackend> CreatureEnv<P> {
    /// Create an idle environment and its persistent torso body
    pub fn new(config: EnvConfig, mut physics: P) -> Result<Self> {
        config.validate()?;

        let seed = config
            .seed
            .unwrap_or_else(|| rand::thread_rng().gen::<u64>());
        let torso = physics.create_body(&torso_desc(
            &TorsoDims::new(1.0, 1.0, 1.0),
            config.origin,
            &config.rig,
        ));

        log::info!(
            "Creature environment ready: {} plan, {} control, seed {}",
            config.generation.name(),
            config.control,
            seed
        );

        Ok(Self {
            policy: Box::new(config.generation.clone()),
            config,
            physics,
            rng: Xoshiro256StarStar::seed_from_u64(seed),
            motors: MotorBank::new(),
            torso,
            rig: None,
            target: None,
            phase: EpisodePhase::Idle,
            episode: 0,
            steps: 0,
            episode_reward: 0.0,
        })
    }

    /// Replace the body plan policy used from the next reset on.
    ///
    /// `config().generation` keeps describing the configured policy; use
    /// [`CreatureEnv::policy_name`] for the one actually in use.
    pub fn with_policy(mut self, policy: Box<dyn BodyPlanPolicy>) -> Result<Self> {
        policy.validate()?;
        log::info!(
            "Body plan policy {} replaces configured {}",
            policy.name(),
            self.config.generation.name()
        );
        self.policy = policy;
        Ok(self)
    }

    /// Begin a new episode and return its first observation
    pub fn reset(&mut self) -> Result<Observation> {
        self.phase = EpisodePhase::Generating;

        if let Some(rig) = self.rig.take() {
            rig.teardown(&mut self.physics);
        }
        if let Some(target) = self.target.take() {
            target.despawn(&mut self.physics);
        }

        self.motors.regenerate(&self.config.motors, &mut self.rng);
        let spec = self.policy.generate(&mut self.rng);

        let rig = match build_rig(
            spec,
            self.torso,
            self.config.origin,
            &self.config.rig,
            &self.motors,
            &mut self.physics,
        ) {
            Ok(rig) => rig,
            Err(e) => {
                self.phase = EpisodePhase::Idle;
                return Err(e);
            }
        };

        self.target = Some(Target::spawn(
            &self.config.target,
            self.config.origin,
            &mut self.rng,
            &mut self.physics,
        ));

        self.episode += 1;
        self.steps = 0;
        self.episode_reward = 0.0;
        self.phase = EpisodePhase::Active;

        log::info!(
            "Episode {} started: {} limbs, {} joints",
            self.episode,
            rig.limb_count(),
            rig.joint_count()
        );
        self.rig = Some(rig);

        self.observe()
    }

    /// Current observation (only while an episode is active)
    pub fn observe(&self) -> Result<Observation> {
        let rig = self.active_rig()?;
        Ok(assemble(
            &self.physics,
            rig,
            self.target.as_ref(),
            self.config.origin,
            &self.config.sensors,
        ))
    }

    /// Run one control step.
    ///
    /// Returns the observation of the post-step state and the step's
    /// outcome. A terminal step's reward is always returned, even when the
    /// environment regenerates before this call returns. If that
    /// regeneration fails the error is logged and the environment is left
    /// `Idle` until the next successful `reset()`.
    pub fn step(&mut self, action: &ActionVector) -> Result<(Observation, StepOutcome)> {
        if self.phase != EpisodePhase::Active {
            return Err(CreatureError::NotActive(self.phase));
        }
        let Some(rig) = self.rig.as_ref() else {
            return Err(CreatureError::NotActive(self.phase));
        };

        actuate(
            self.config.control,
            action,
            rig,
            &mut self.motors,
            &self.config.reward,
            &mut self.physics,
        )?;

        for _ in 0..self.config.substeps {
            self.physics.step(self.config.timestep);
        }

        let outcome = score(
            self.config.control,
            &self.physics,
            rig,
            self.target.as_ref(),
            &self.config.reward,
        );
        let observation = assemble(
            &self.physics,
            rig,
            self.target.as_ref(),
            self.config.origin,
            &self.config.sensors,
        );

        self.steps += 1;
        self.episode_reward += outcome.reward;

        if outcome.captured && !self.config.auto_reset {
            self.respawn_target();
        }
        if outcome.done {
            let reason = if outcome.captured {
                "target reached"
            } else {
                "done"
            };
            // The step already happened; a failed regeneration leaves the env Idle
            if let Err(e) = self.terminate(reason) {
                log::error!(
                    "Regeneration after episode {} failed: {}",
                    self.episode,
                    e
                );
            }
        }

        Ok((observation, outcome))
    }

    /// External end-of-episode signal (e.g. step budget exhausted)
    pub fn end_episode(&mut self) -> Result<()> {
        if self.phase != EpisodePhase::Active {
            return Err(CreatureError::NotActive(self.phase));
        }
        self.terminate("ended externally")
    }

    fn terminate(&mut self, reason: &str) -> Result<()> {
        self.phase = EpisodePhase::Terminating;
        log::info!(
            "Episode {} {} after {} steps (reward {:.4})",
            self.episode,
            reason,
            self.steps,
            self.episode_reward
        );

        if self.config.auto_reset {
            self.reset()?;
        }
        Ok(())
    }

    fn respawn_target(&mut self) {
        if let Some(old) = self.target.take() {
            old.despawn(&mut self.physics);
        }
        self.target = Some(Target::spawn(
            &self.config.target,
            self.config.origin,
            &mut self.rng,
            &mut self.physics,
        ));
    }

    fn active_rig(&self) -> Result<&Rig> {
        match (&self.phase, &self.rig) {
            (EpisodePhase::Active, Some(rig)) => Ok(rig),
            _ => Err(CreatureError::NotActive(self.phase)),
        }
    }

    pub fn phase(&self) -> EpisodePhase {
        self.phase
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    /// Name of the body plan policy generating creatures
    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn rig(&self) -> Option<&Rig> {
        self.rig.as_ref()
    }

    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    pub fn torso(&self) -> BodyId {
        self.torso
    }

    pub fn motors(&self) -> &MotorBank {
        &self.motors
    }

    pub fn physics(&self) -> &P {
        &self.physics
    }

    pub fn physics_mut(&mut self) -> &mut P {
        &mut self.physics
    }

    /// Number of episodes started so far
    pub fn episode(&self) -> u64 {
        self.episode
    }

    /// Steps taken in the current episode
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Cumulative reward of the current episode
    pub fn episode_reward(&self) -> f32 {
        self.episode_reward
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::KinematicWorld;
    use crate::types::JOINT_CAPACITY;

    fn env(config: EnvConfig) -> CreatureEnv<KinematicWorld> {
        CreatureEnv::new(config.with_seed(12345), KinematicWorld::new()).unwrap()
    }

    /// Target spawns right where the torso is
    fn capture_config() -> EnvConfig {
        let mut config = EnvConfig::free_ranging();
        config.generation = GenerationPolicy::FreeRanging(crate::body_plan::FreeRangingPlan {
            torso_height: crate::types::Bounds::fixed(2.0),
            ..Default::default()
        });
        config.target.radius = 0.0;
        config.target.height = config.rig.spawn_height + 1.0;
        config.target.gravity = false;
        config
    }

    #[test]
    fn test_starts_idle() {
        let mut env = env(EnvConfig::default());
        assert_eq!(env.phase(), EpisodePhase::Idle);
        assert!(matches!(
            env.step(&[0.0; JOINT_CAPACITY]),
            Err(CreatureError::NotActive(EpisodePhase::Idle))
        ));
        assert!(env.observe().is_err());
        assert!(env.end_episode().is_err());
        assert_eq!(env.physics().body_count(), 1);
    }

    #[test]
    fn test_reset_builds_rig_and_target() {
        let mut env = env(EnvConfig::default());
        let obs = env.reset().unwrap();

        assert_eq!(env.phase(), EpisodePhase::Active);
        assert_eq!(env.episode(), 1);
        assert_eq!(obs.as_slice().len(), 41);

        let rig = env.rig().unwrap();
        let segments = rig.segments().len();
        assert_eq!(rig.joint_count(), segments);
        assert_eq!(env.physics().body_count(), 1 + segments + 1);
        assert_eq!(env.physics().joint_count(), segments);
    }

    #[test]
    fn test_reset_twice_replaces_everything() {
        let mut env = env(EnvConfig::default());
        env.reset().unwrap();
        let first_target = env.target().unwrap().body;
        let torso = env.torso();

        env.reset().unwrap();
        assert_eq!(env.episode(), 2);
        assert_ne!(env.target().unwrap().body, first_target);
        assert_eq!(env.torso(), torso);

        let segments = env.rig().unwrap().segments().len();
        assert_eq!(env.physics().body_count(), segments + 2);
        assert_eq!(env.physics().joint_count(), segments);
    }

    #[test]
    fn test_step_counts_and_accumulates() {
        let mut env = env(EnvConfig::default());
        env.reset().unwrap();

        // Target spawns at height 3, the torso starts near 6: no capture this early
        let mut total = 0.0;
        for _ in 0..10 {
            let (obs, outcome) = env.step(&[0.3; JOINT_CAPACITY]).unwrap();
            assert!(obs.as_slice().iter().all(|v| v.is_finite()));
            assert!(!outcome.done);
            assert!(outcome.reward < 0.0);
            total += outcome.reward;
        }

        assert_eq!(env.steps(), 10);
        assert!((env.episode_reward() - total).abs() < 1e-5);
    }

    #[test]
    fn test_capture_auto_resets() {
        let mut env = env(capture_config());
        env.reset().unwrap();

        let (_, outcome) = env.step(&[0.0; JOINT_CAPACITY]).unwrap();
        assert!(outcome.done && outcome.captured);
        assert!(outcome.reward > 0.9);

        assert_eq!(env.phase(), EpisodePhase::Active);
        assert_eq!(env.episode(), 2);
        assert_eq!(env.steps(), 0);
    }

    #[test]
    fn test_capture_without_auto_reset() {
        let mut config = capture_config();
        config.auto_reset = false;
        let mut env = env(config);
        env.reset().unwrap();
        let old_target = env.target().unwrap().body;

        let (_, outcome) = env.step(&[0.0; JOINT_CAPACITY]).unwrap();
        assert!(outcome.captured);
        assert_eq!(env.phase(), EpisodePhase::Terminating);
        assert_ne!(env.target().unwrap().body, old_target);
        assert!(matches!(
            env.step(&[0.0; JOINT_CAPACITY]),
            Err(CreatureError::NotActive(EpisodePhase::Terminating))
        ));

        env.reset().unwrap();
        assert_eq!(env.phase(), EpisodePhase::Active);
        assert_eq!(env.episode(), 2);
    }

    #[test]
    fn test_end_episode() {
        let mut config = EnvConfig::default();
        config.auto_reset = false;
        let mut env = env(config);
        env.reset().unwrap();
        env.step(&[0.0; JOINT_CAPACITY]).unwrap();

        env.end_episode().unwrap();
        assert_eq!(env.phase(), EpisodePhase::Terminating);
        assert!(env.end_episode().is_err());

        let mut env = self::env(EnvConfig::default());
        env.reset().unwrap();
        env.end_episode().unwrap();
        assert_eq!(env.phase(), EpisodePhase::Active);
        assert_eq!(env.episode(), 2);
    }

    #[test]
    fn test_bipedal_static_never_rewards() {
        let mut env = env(EnvConfig::bipedal());
        env.reset().unwrap();
        assert_eq!(env.rig().unwrap().joint_count(), 12);

        let before: Vec<f32> = env.motors().iter().map(|m| m.target_velocity).collect();
        for _ in 0..20 {
            let (_, outcome) = env.step(&[1.0; JOINT_CAPACITY]).unwrap();
            assert_eq!(outcome.reward, 0.0);
            assert!(!outcome.done);
        }
        let after: Vec<f32> = env.motors().iter().map(|m| m.target_velocity).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_seeded_envs_match() {
        let mut a = env(EnvConfig::default());
        let mut b = env(EnvConfig::default());
        assert_eq!(a.reset().unwrap(), b.reset().unwrap());

        let action = [0.7; JOINT_CAPACITY];
        assert_eq!(a.step(&action).unwrap(), b.step(&action).unwrap());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EnvConfig::default();
        config.substeps = 0;
        assert!(CreatureEnv::new(config, KinematicWorld::new()).is_err());

        let mut config = EnvConfig::default();
        config.target.size = 0.0;
        assert!(matches!(
            CreatureEnv::new(config, KinematicWorld::new()),
            Err(CreatureError::InvalidConfig(_))
        ));

        let mut config = EnvConfig::default();
        config.rig.torso_mass = -1.0;
        assert!(matches!(
            CreatureEnv::new(config, KinematicWorld::new()),
            Err(CreatureError::InvalidConfig(_))
        ));
    }

    /// One buildable plan, then only plans with a fifth limb past the last slot
    struct BreaksAfterFirst {
        calls: std::cell::Cell<u32>,
    }

    impl BodyPlanPolicy for BreaksAfterFirst {
        fn name(&self) -> &'static str {
            "BreaksAfterFirst"
        }

        fn generate(&self, _rng: &mut dyn rand::RngCore) -> crate::body_plan::CreatureSpec {
            use crate::body_plan::{CreatureSpec, LimbSpec, SegmentSpec};

            let segment = SegmentSpec {
                extents: Vec3::new(0.4, 0.8, 0.4),
                mass: 1.0,
                axis: Vec3::X,
            };
            let limb = |joint_base| LimbSpec {
                attachment: Vec3::new(0.5, -0.5, 0.0),
                direction: Vec3::NEG_Y,
                segments: vec![segment; 2],
                color: [0, 0, 0, 255],
                joint_base,
            };

            let call = self.calls.get();
            self.calls.set(call + 1);
            let limbs = if call == 0 {
                vec![limb(0)]
            } else {
                (0..5).map(|i| limb(i * 3)).collect()
            };
            CreatureSpec {
                torso: TorsoDims::new(1.0, 2.0, 1.0),
                limbs,
            }
        }

        fn validate(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_terminal_reward_survives_failed_regeneration() {
        let mut env = env(capture_config())
            .with_policy(Box::new(BreaksAfterFirst {
                calls: std::cell::Cell::new(0),
            }))
            .unwrap();
        env.reset().unwrap();

        // Capture ends the episode and the auto reset hits the overrun
        let (obs, outcome) = env.step(&[0.0; JOINT_CAPACITY]).unwrap();
        assert!(outcome.done && outcome.captured);
        assert!(outcome.reward > 0.9);
        assert!(obs.as_slice().iter().all(|v| v.is_finite()));

        assert_eq!(env.phase(), EpisodePhase::Idle);
        assert!(env.rig().is_none());
        assert!(env.target().is_none());
        assert_eq!(env.physics().body_count(), 1);
        assert_eq!(env.physics().joint_count(), 0);
        assert!(matches!(
            env.step(&[0.0; JOINT_CAPACITY]),
            Err(CreatureError::NotActive(EpisodePhase::Idle))
        ));

        // An explicit reset still reports the build error
        assert!(matches!(
            env.reset(),
            Err(CreatureError::CapacityOverrun { slot: 12, .. })
        ));
    }

    #[test]
    fn test_policy_name_tracks_replacement() {
        let env = env(EnvConfig::default());
        assert_eq!(env.policy_name(), env.config().generation.name());

        let env = env
            .with_policy(Box::new(BreaksAfterFirst {
                calls: std::cell::Cell::new(0),
            }))
            .unwrap();
        assert_eq!(env.policy_name(), "BreaksAfterFirst");
        assert_eq!(env.config().generation.name(), "FreeRanging");
    }
}
