//! Monitor command implementation

use crate::config::{Config, TrackedPosition};
use crate::monitor::{MonitorUpdate, PositionId, TradeMonitor};
use crate::risk::PositionState;
use crate::ws::{ConnectionStatus, TungsteniteConnector};
use clap::Args;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Print each position snapshot as a JSON line on stdout
    #[arg(long)]
    pub json: bool,
}

impl MonitorArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        config.validate()?;
        if config.positions.is_empty() {
            anyhow::bail!("No positions configured");
        }

        let mut monitor = TradeMonitor::new(config.feed.clone(), Arc::new(TungsteniteConnector));
        track_all(&mut monitor, &config.positions)?;
        drive(&mut monitor, self.json).await
    }
}

/// Track every configured position
pub(crate) fn track_all(
    monitor: &mut TradeMonitor,
    positions: &[TrackedPosition],
) -> anyhow::Result<()> {
    for tracked in positions {
        let id = tracked.id.unwrap_or_else(Uuid::new_v4);
        monitor.track_with_id(id, tracked.position.clone())?;
    }
    Ok(())
}

/// Render updates until the feeds finish or the process is interrupted
pub(crate) async fn drive(monitor: &mut TradeMonitor, json: bool) -> anyhow::Result<()> {
    loop {
        tokio::select! {
            update = monitor.next_update() => match update {
                Some(update) => render(&update, json)?,
                None => {
                    tracing::warn!("All feeds finished");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
        }
    }

    for (id, state) in monitor.book().iter() {
        tracing::info!(
            %id,
            symbol = state.symbol(),
            price = state.current_price(),
            pnl = state.unrealized_pnl(),
            "Final position state"
        );
    }
    monitor.shutdown();
    Ok(())
}

#[derive(Serialize)]
struct PositionLine<'a> {
    id: PositionId,
    fired: bool,
    #[serde(flatten)]
    state: &'a PositionState,
}

fn render(update: &MonitorUpdate, json: bool) -> anyhow::Result<()> {
    match update {
        MonitorUpdate::Position(update) if json => {
            let line = PositionLine {
                id: update.id,
                fired: update.fired,
                state: &update.state,
            };
            println!("{}", serde_json::to_string(&line)?);
        }
        MonitorUpdate::Position(update) => {
            let state = &update.state;
            tracing::info!(
                id = %update.id,
                symbol = state.symbol(),
                price = state.current_price(),
                pnl = state.unrealized_pnl(),
                pnl_pct = state.pnl_percent(),
                rr = state.risk_reward_ratio(),
                r = state.r_multiple(),
                trigger = ?state.trigger_state(),
                stop = ?state.effective_stop_loss(),
                "Position update"
            );
        }
        MonitorUpdate::Connection { symbol, status } => match status {
            ConnectionStatus::Closed => tracing::warn!(%symbol, %status, "Feed disconnected"),
            ConnectionStatus::Errored => tracing::warn!(%symbol, %status, "Feed error"),
            _ => tracing::info!(%symbol, %status, "Feed connected"),
        },
        MonitorUpdate::Untracked { id, state } => {
            tracing::info!(
                %id,
                symbol = state.symbol(),
                pnl = state.unrealized_pnl(),
                "Trade closed, monitoring stopped"
            );
        }
    }
    Ok(())
}
