//! Headless episode runs
//!
//! - Episode runner driving a creature environment with an action source
//! - JSON run report with per-episode summaries

mod report;
mod runner;

pub use report::{RunReport, RunTotals};
pub use runner::{EpisodeRunner, EpisodeSummary};
