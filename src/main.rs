use clap::Parser;
use trade_monitor::cli::{print_status, Cli, Commands};
use trade_monitor::config::Config;

const DEFAULT_CONFIG: &str = include_str!("../config.toml.example");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            toml::from_str(DEFAULT_CONFIG)?
        }
    };

    // Initialize telemetry
    trade_monitor::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Monitor(args) => {
            tracing::info!(positions = config.positions.len(), "Starting trade monitor");
            args.execute(&config).await?;
        }
        Commands::Replay(args) => {
            tracing::info!("Starting replay");
            args.execute(&config).await?;
        }
        Commands::Status => print_status(&config)?,
        Commands::Config => {
            println!("Current configuration:");
            println!("  Feed: {}", config.feed.url);
            println!(
                "  Reconnect: {} attempts, {}ms delay",
                config.feed.max_reconnect_attempts, config.feed.reconnect_delay_ms
            );
            println!("  Message types: {:?}", config.feed.message_types);
            println!(
                "  Telemetry: level={} format={:?} metrics_port={:?}",
                config.telemetry.log_level,
                config.telemetry.log_format,
                config.telemetry.metrics_port
            );
            for tracked in &config.positions {
                let p = &tracked.position;
                println!(
                    "  Position: {} {:?} entry={} qty={} stop={:?} target={:?} rr_trigger={}",
                    p.symbol,
                    p.direction,
                    p.entry_price,
                    p.quantity,
                    p.stop_loss,
                    p.take_profit,
                    if p.rr_trigger.enabled {
                        format!("{}R ({:?})", p.rr_trigger.profit_threshold, p.rr_trigger.mode)
                    } else {
                        "off".to_string()
                    }
                );
            }
        }
    }

    Ok(())
}
