//! Replay command implementation

use super::monitor::{drive, track_all};
use crate::config::Config;
use crate::monitor::TradeMonitor;
use crate::ws::{MemoryConnector, ScriptStep};
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// File with one recorded feed frame per line
    #[arg(short, long)]
    pub frames: PathBuf,

    /// Print each position snapshot as a JSON line on stdout
    #[arg(long)]
    pub json: bool,
}

impl ReplayArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        config.validate()?;

        let steps = load_frames(&self.frames)?;
        tracing::info!(frames = steps.len() - 1, path = ?self.frames, "Replaying recorded frames");

        // Every subscription plays the recording once, then closes for good
        let mut feed = config.feed.clone();
        feed.max_reconnect_attempts = 0;

        let mut monitor = TradeMonitor::new(feed, Arc::new(MemoryConnector::replaying(steps)));
        track_all(&mut monitor, &config.positions)?;
        drive(&mut monitor, self.json).await
    }
}

/// Read non-empty lines as frames, followed by a server close
fn load_frames(path: &Path) -> anyhow::Result<Vec<ScriptStep>> {
    let content = std::fs::read_to_string(path)?;
    let mut steps: Vec<ScriptStep> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| ScriptStep::Frame(line.to_string()))
        .collect();
    steps.push(ScriptStep::Close);
    Ok(steps)
}
