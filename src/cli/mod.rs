//! CLI interface for trade-monitor
//!
//! Provides subcommands for:
//! - `monitor`: Stream prices and track configured positions
//! - `replay`: Run configured positions against recorded feed frames
//! - `status`: Show configured positions at entry
//! - `config`: Show configuration

mod monitor;
mod replay;
mod status;

pub use monitor::MonitorArgs;
pub use replay::ReplayArgs;
pub use status::print_status;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "trade-monitor")]
#[command(about = "Real-time trade monitoring with RR-trigger stop management")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream prices and track configured positions
    Monitor(MonitorArgs),
    /// Run configured positions against recorded feed frames
    Replay(ReplayArgs),
    /// Show configured positions at entry
    Status,
    /// Show configuration
    Config,
}
