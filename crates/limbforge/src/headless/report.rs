//! JSON report for headless runs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::runner::EpisodeSummary;
use crate::config::RunConfig;

/// Aggregated results of a run, written as `summary.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub variant: String,
    pub control: String,
    pub backend: String,
    pub seed: Option<u64>,
    pub max_steps: u64,
    pub results: RunTotals,
    pub episodes: Vec<EpisodeSummary>,
}

/// Totals over all episodes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunTotals {
    pub episodes: usize,
    pub captures: usize,
    pub capture_rate: f32,
    pub mean_reward: f32,
    pub best_reward: f32,
    pub mean_steps: f32,
}

impl RunTotals {
    pub fn from_summaries(summaries: &[EpisodeSummary]) -> Self {
        if summaries.is_empty() {
            return Self::default();
        }

        let n = summaries.len() as f32;
        let captures = summaries.iter().filter(|s| s.captured).count();
        Self {
            episodes: summaries.len(),
            captures,
            capture_rate: captures as f32 / n,
            mean_reward: summaries.iter().map(|s| s.reward).sum::<f32>() / n,
            best_reward: summaries
                .iter()
                .map(|s| s.reward)
                .fold(f32::NEG_INFINITY, f32::max),
            mean_steps: summaries.iter().map(|s| s.steps as f32).sum::<f32>() / n,
        }
    }
}

impl RunReport {
    pub fn new(config: &RunConfig, summaries: Vec<EpisodeSummary>) -> Self {
        let env = config.to_env_config();
        Self {
            variant: config.creature.variant.name().to_string(),
            control: env.control.name().to_string(),
            backend: config.physics.backend.name().to_string(),
            seed: config.creature.seed,
            max_steps: config.run.max_steps,
            results: RunTotals::from_summaries(&summaries),
            episodes: summaries,
        }
    }

    /// Write `summary.json` into `output_dir`, creating it if needed
    pub fn write(&self, output_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let output_dir = output_dir.as_ref();
        fs::create_dir_all(output_dir).context("Failed to create output directory")?;

        let json = serde_json::to_string_pretty(self).context("Failed to serialize run report")?;
        let path = output_dir.join("summary.json");
        fs::write(&path, json).context("Failed to write summary JSON")?;

        log::info!("Report generated: {}", path.display());
        Ok(path)
    }
}
