//! Episode runner
//!
//! Drives a [`CreatureEnv`] for a fixed number of episodes, feeding it
//! actions and sending the end signal once the step budget runs out.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use serde::{Deserialize, Serialize};

use limbforge_creature::{
    ActionSource, CreatureEnv, EnvConfig, EpisodePhase, PhysicsBackend, RandomActions,
    StepOutcome,
};

use crate::config::RunSettings;

/// Result of a single episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    /// 1-based episode number
    pub episode: u64,
    /// Control steps taken
    pub steps: u64,
    /// Cumulative reward
    pub reward: f32,
    /// Whether the target was reached
    pub captured: bool,
    pub limbs: usize,
    pub joints: usize,
    /// Torso to target distance after the last step
    pub final_distance: Option<f32>,
}

/// Runs episodes back to back on one environment
pub struct EpisodeRunner<P: PhysicsBackend> {
    env: CreatureEnv<P>,
    actions: Box<dyn ActionSource>,
    episodes: usize,
    max_steps: u64,
}

impl<P: PhysicsBackend> EpisodeRunner<P> {
    /// Create a runner driven by uniform random actions
    pub fn new(mut env_config: EnvConfig, physics: P, settings: &RunSettings) -> Result<Self> {
        // Termination is handled here, one reset per episode
        env_config.auto_reset = false;

        // Actions get their own stream so they don't shift the plan draws
        let action_seed = env_config
            .seed
            .map(|seed| seed.wrapping_add(1))
            .unwrap_or_else(|| rand::thread_rng().gen::<u64>());

        let env = CreatureEnv::new(env_config, physics).context("Failed to create environment")?;

        Ok(Self {
            env,
            actions: Box::new(RandomActions::new(Xoshiro256StarStar::seed_from_u64(
                action_seed,
            ))),
            episodes: settings.episodes,
            max_steps: settings.max_steps,
        })
    }

    /// Replace the action source
    pub fn with_actions(mut self, actions: Box<dyn ActionSource>) -> Self {
        self.actions = actions;
        self
    }

    pub fn env(&self) -> &CreatureEnv<P> {
        &self.env
    }

    /// Create a progress bar style
    fn progress_style() -> Result<ProgressStyle> {
        Ok(ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
            )
            .context("Invalid progress bar template")?
            .progress_chars("█▓░"))
    }

    /// Run every episode and collect their summaries
    pub fn run(&mut self) -> Result<Vec<EpisodeSummary>> {
        let pb = ProgressBar::new(self.episodes as u64);
        pb.set_style(Self::progress_style()?);

        let mut summaries = Vec::with_capacity(self.episodes);
        for _ in 0..self.episodes {
            let summary = self.run_episode()?;
            pb.println(format!(
                "Episode {:>4}: {} limbs / {} joints, {:>5} steps, reward {:>8.3}{}",
                summary.episode,
                summary.limbs,
                summary.joints,
                summary.steps,
                summary.reward,
                if summary.captured { ", captured" } else { "" }
            ));
            pb.set_message(format!("reward {:.3}", summary.reward));
            pb.inc(1);
            summaries.push(summary);
        }

        pb.finish_with_message("Run complete");
        Ok(summaries)
    }

    /// Run one episode until it ends or the step budget is spent
    pub fn run_episode(&mut self) -> Result<EpisodeSummary> {
        let mut observation = self.env.reset().context("Failed to start episode")?;
        let (limbs, joints) = self
            .env
            .rig()
            .map(|rig| (rig.limb_count(), rig.joint_count()))
            .unwrap_or_default();

        let mut last = StepOutcome::default();
        let mut captured = false;
        for _ in 0..self.max_steps {
            let action = self.actions.act(&observation);
            let (next, outcome) = self.env.step(&action).context("Failed to step episode")?;
            observation = next;
            last = outcome;
            captured |= outcome.captured;
            if outcome.done {
                break;
            }
        }

        if self.env.phase() == EpisodePhase::Active {
            log::debug!("Step budget of {} exhausted", self.max_steps);
            self.env.end_episode().context("Failed to end episode")?;
        }

        Ok(EpisodeSummary {
            episode: self.env.episode(),
            steps: self.env.steps(),
            reward: self.env.episode_reward(),
            captured,
            limbs,
            joints,
            final_distance: last.distance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use limbforge_creature::{ConstantActions, ControlMode, KinematicWorld, JOINT_CAPACITY};

    fn settings(episodes: usize, max_steps: u64) -> RunSettings {
        RunSettings {
            episodes,
            max_steps,
            ..Default::default()
        }
    }

    #[test]
    fn test_runs_requested_episodes() {
        let config = EnvConfig::default().with_seed(5);
        let mut runner =
            EpisodeRunner::new(config, KinematicWorld::new(), &settings(3, 20)).unwrap();

        let summaries = runner.run().unwrap();
        assert_eq!(summaries.len(), 3);
        for (i, summary) in summaries.iter().enumerate() {
            assert_eq!(summary.episode, i as u64 + 1);
            assert!(summary.steps >= 1 && summary.steps <= 20);
            assert!(summary.limbs >= 1 && summary.limbs <= 4);
            assert!(summary.joints >= summary.limbs);
        }
        assert_eq!(runner.env().phase(), EpisodePhase::Terminating);
    }

    #[test]
    fn test_step_budget_ends_episode() {
        // Static control never finishes on its own
        let mut config = EnvConfig::bipedal().with_seed(9);
        config.control = ControlMode::Static;
        let mut runner =
            EpisodeRunner::new(config, KinematicWorld::new(), &settings(1, 15)).unwrap();

        let summary = runner.run_episode().unwrap();
        assert_eq!(summary.steps, 15);
        assert_eq!(summary.reward, 0.0);
        assert!(!summary.captured);
        assert!(summary.final_distance.is_some());
        assert_eq!(runner.env().phase(), EpisodePhase::Terminating);
    }

    #[test]
    fn test_capture_stops_early() {
        let mut config = EnvConfig::default().with_seed(3);
        config.target.radius = 0.0;
        config.target.height = config.rig.spawn_height + 0.5;
        config.target.gravity = false;
        config.reward.capture_radius = 10.0;

        let mut runner = EpisodeRunner::new(config, KinematicWorld::new(), &settings(1, 100))
            .unwrap()
            .with_actions(Box::new(ConstantActions([0.0; JOINT_CAPACITY])));

        let summary = runner.run_episode().unwrap();
        assert!(summary.captured);
        assert_eq!(summary.steps, 1);
        assert!(summary.reward > 0.0);
    }

    #[test]
    fn test_seeded_runs_repeat() {
        let run = || {
            let mut runner = EpisodeRunner::new(
                EnvConfig::default().with_seed(77),
                KinematicWorld::new(),
                &settings(2, 10),
            )
            .unwrap();
            runner.run().unwrap()
        };
        assert_eq!(run(), run());
    }
}
