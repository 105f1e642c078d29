use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;

use limbforge::creature::{
    BodyPlanPolicy, ControlMode, EnvConfig, KinematicWorld, PhysicsBackend, PlanVariant,
};
use limbforge::{Backend, EpisodeRunner, Overrides, RunConfig, RunReport};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of episodes to run
    #[arg(long)]
    episodes: Option<usize>,

    /// Step budget per episode
    #[arg(long)]
    max_steps: Option<u64>,

    /// Body plan: free-ranging, bipedal
    #[arg(long)]
    variant: Option<PlanVariant>,

    /// Control mode: policy, static (defaults to the variant's preset)
    #[arg(long)]
    control: Option<ControlMode>,

    /// Physics backend: kinematic, rapier
    #[arg(long)]
    backend: Option<Backend>,

    /// RNG seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Output directory for the run report
    #[arg(long)]
    output: Option<String>,

    /// Skip writing summary.json
    #[arg(long)]
    no_report: bool,

    /// Print one generated body plan as RON and exit
    #[arg(long)]
    dump_plan: bool,

    /// Config file name (RON, extension optional)
    #[arg(long, default_value = limbforge::config::CONFIG_FILE)]
    config: String,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            episodes: self.episodes,
            max_steps: self.max_steps,
            variant: self.variant,
            control: self.control,
            backend: self.backend,
            seed: self.seed,
            output_dir: self.output.clone(),
            no_report: self.no_report,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = RunConfig::load_from(&args.config)?;
    config.apply(args.overrides());
    let env_config = config.to_env_config();

    if args.dump_plan {
        return dump_plan(&env_config);
    }

    log::info!("Starting headless run");
    log::info!("  Variant: {}", config.creature.variant);
    log::info!("  Control: {}", env_config.control);
    log::info!("  Backend: {}", config.physics.backend);
    log::info!("  Episodes: {}", config.run.episodes);
    log::info!("  Max steps: {}", config.run.max_steps);

    match config.physics.backend {
        Backend::Kinematic => run_with(&config, env_config, KinematicWorld::new()),
        #[cfg(feature = "rapier")]
        Backend::Rapier => run_with(&config, env_config, limbforge::creature::RapierWorld::new()),
        #[cfg(not(feature = "rapier"))]
        Backend::Rapier => {
            anyhow::bail!("The rapier backend requires the 'rapier' feature")
        }
    }
}

fn run_with<P: PhysicsBackend>(config: &RunConfig, env_config: EnvConfig, physics: P) -> Result<()> {
    let mut runner = EpisodeRunner::new(env_config, physics, &config.run)?;
    let summaries = runner.run()?;

    let report = RunReport::new(config, summaries);
    log::info!(
        "Finished {} episodes: {} captures, mean reward {:.3}",
        report.results.episodes,
        report.results.captures,
        report.results.mean_reward
    );

    if config.run.report {
        report.write(&config.run.output_dir)?;
    }
    Ok(())
}

fn dump_plan(env_config: &EnvConfig) -> Result<()> {
    let seed = env_config
        .seed
        .unwrap_or_else(|| rand::thread_rng().gen::<u64>());
    let spec = env_config.generation.generate_seeded(seed);

    let ron = ron::ser::to_string_pretty(&spec, ron::ser::PrettyConfig::default())
        .context("Failed to serialize body plan")?;
    println!("{}", ron);
    Ok(())
}
