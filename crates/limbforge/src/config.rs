//! Run configuration with layered loading
//!
//! Configuration is loaded from multiple sources (lowest to highest priority):
//! 1. Compiled defaults
//! 2. `limbforge.ron` file (if exists)
//! 3. Environment variables prefixed with `LIMBFORGE_`
//! 4. Command-line flags (applied by the binary through [`Overrides`])
//!
//! Example environment variable: `LIMBFORGE_RUN__MAX_STEPS=500`

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use limbforge_creature::{ControlMode, EnvConfig, PlanVariant};

/// Default config file name (extension optional)
pub const CONFIG_FILE: &str = "limbforge";

/// Main run configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RunConfig {
    #[serde(default)]
    pub run: RunSettings,

    #[serde(default)]
    pub creature: CreatureSettings,

    #[serde(default)]
    pub physics: PhysicsSettings,
}

/// Episode budget and output settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunSettings {
    /// Number of episodes to run
    pub episodes: usize,
    /// Step budget per episode before the external end signal
    pub max_steps: u64,
    /// Directory for `summary.json`
    pub output_dir: String,
    /// Write the JSON report at the end of the run
    pub report: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            episodes: 10,
            max_steps: 1000,
            output_dir: "run_output".to_string(),
            report: true,
        }
    }
}

/// Creature generation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CreatureSettings {
    /// Body plan family
    pub variant: PlanVariant,
    /// Control mode (preset of the variant if not set)
    pub control: Option<ControlMode>,
    /// RNG seed (random if not set)
    pub seed: Option<u64>,
    /// Height of the torso bottom above the origin at spawn
    pub spawn_height: f32,
}

impl Default for CreatureSettings {
    fn default() -> Self {
        Self {
            variant: PlanVariant::default(),
            control: None,
            seed: None,
            spawn_height: 5.0,
        }
    }
}

/// Which physics backend drives the episodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Built-in kinematic integrator
    #[default]
    Kinematic,
    /// rapier3d rigid body simulation
    Rapier,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Kinematic => "kinematic",
            Backend::Rapier => "rapier",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "kinematic" | "simple" => Ok(Backend::Kinematic),
            "rapier" | "rapier3d" => Ok(Backend::Rapier),
            _ => Err(format!("Unknown backend: {}. Valid: kinematic, rapier", s)),
        }
    }
}

/// Physics settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PhysicsSettings {
    pub backend: Backend,
    /// Seconds per physics step
    pub timestep: f32,
    /// Physics steps per control step
    pub substeps: u32,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            timestep: 0.02,
            substeps: 1,
        }
    }
}

/// Highest-priority layer: values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub episodes: Option<usize>,
    pub max_steps: Option<u64>,
    pub variant: Option<PlanVariant>,
    pub control: Option<ControlMode>,
    pub backend: Option<Backend>,
    pub seed: Option<u64>,
    pub output_dir: Option<String>,
    pub no_report: bool,
}

impl RunConfig {
    /// Load configuration with layered priority:
    /// 1. Compiled defaults (lowest priority)
    /// 2. The named RON file (if exists)
    /// 3. Environment variables prefixed with `LIMBFORGE_` (highest priority)
    pub fn load_from(file: &str) -> Result<Self> {
        let builder = Config::builder()
            // Layer 1: Compiled defaults
            .set_default("run.episodes", 10_i64)?
            .set_default("run.max_steps", 1000_i64)?
            .set_default("run.output_dir", "run_output")?
            .set_default("run.report", true)?
            .set_default("creature.variant", "FreeRanging")?
            .set_default("creature.spawn_height", 5.0)?
            .set_default("physics.backend", "kinematic")?
            .set_default("physics.timestep", 0.02)?
            .set_default("physics.substeps", 1_i64)?
            // Layer 2: Config file (optional, won't error if missing)
            .add_source(File::with_name(file).format(FileFormat::Ron).required(false))
            // Layer 3: Environment variables (LIMBFORGE_RUN__EPISODES, etc.)
            .add_source(
                Environment::with_prefix("LIMBFORGE")
                    .prefix_separator("_")
                    .separator("__"),
            );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Layer 4: command-line values win over everything else
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(episodes) = overrides.episodes {
            self.run.episodes = episodes;
        }
        if let Some(max_steps) = overrides.max_steps {
            self.run.max_steps = max_steps;
        }
        if let Some(output_dir) = overrides.output_dir {
            self.run.output_dir = output_dir;
        }
        if overrides.no_report {
            self.run.report = false;
        }
        if let Some(variant) = overrides.variant {
            self.creature.variant = variant;
        }
        if overrides.control.is_some() {
            self.creature.control = overrides.control;
        }
        if overrides.seed.is_some() {
            self.creature.seed = overrides.seed;
        }
        if let Some(backend) = overrides.backend {
            self.physics.backend = backend;
        }
    }

    /// Environment parameters for the configured variant
    ///
    /// Episodes never auto-reset: the runner starts each one explicitly.
    pub fn to_env_config(&self) -> EnvConfig {
        let mut env = EnvConfig::for_variant(self.creature.variant);
        if let Some(control) = self.creature.control {
            env.control = control;
        }
        env.seed = self.creature.seed;
        env.rig.spawn_height = self.creature.spawn_height;
        env.timestep = self.physics.timestep;
        env.substeps = self.physics.substeps;
        env.auto_reset = false;
        env
    }
}
