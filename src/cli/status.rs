//! Status command implementation

use crate::config::Config;
use crate::risk;

/// Print every configured position as it stands at entry
pub fn print_status(config: &Config) -> anyhow::Result<()> {
    println!("trade-monitor status");
    println!("  Feed: {}", config.feed.url);
    println!("  Positions: {}", config.positions.len());

    for tracked in &config.positions {
        let state = risk::initialize(tracked.position.clone())?;
        let id = tracked
            .id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());

        println!(
            "  {} {:?} {} @ {} x {} | stop {:?} target {:?} | risk {:.2} reward {:.2} RR {:.2} | trigger {:?} at {:.4}",
            id,
            state.direction(),
            state.symbol(),
            state.entry_price(),
            state.quantity(),
            state.stop_loss(),
            state.take_profit(),
            state.risk_amount(),
            state.reward_amount(),
            state.risk_reward_ratio(),
            state.trigger_state(),
            state.trigger_price(),
        );
    }
    Ok(())
}
