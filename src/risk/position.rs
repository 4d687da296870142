//! Per-position risk reducer
//!
//! A [`PositionState`] is an immutable snapshot: static configuration plus
//! every metric derived from the last price. [`on_tick`] never mutates its
//! input, so snapshots can be kept, compared, and fanned out freely.

use super::types::{Direction, PositionConfig, RiskError, TriggerMode, TriggerState};
use serde::Serialize;

/// Snapshot of one monitored position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionState {
    #[serde(flatten)]
    config: PositionConfig,
    current_price: f64,
    unrealized_pnl: f64,
    pnl_percent: f64,
    risk_amount: f64,
    reward_amount: f64,
    risk_reward_ratio: f64,
    r_multiple: f64,
    trigger_price: f64,
    trigger_state: TriggerState,
    effective_stop_loss: Option<f64>,
}

/// Validate `config` and build the snapshot at the entry price
pub fn initialize(config: PositionConfig) -> Result<PositionState, RiskError> {
    config.validate()?;

    let initial = if config.rr_trigger.enabled {
        TriggerState::Armed
    } else {
        TriggerState::Disabled
    };
    let entry_price = config.entry_price;

    Ok(derive(config, initial, entry_price))
}

/// Compute the next snapshot for a new price
///
/// Non-finite prices are ignored and return the prior snapshot unchanged.
pub fn on_tick(state: &PositionState, price: f64) -> PositionState {
    if !price.is_finite() {
        return state.clone();
    }
    derive(state.config.clone(), state.trigger_state, price)
}

fn derive(config: PositionConfig, prior: TriggerState, price: f64) -> PositionState {
    let entry = config.entry_price;
    let quantity = config.quantity;

    let price_diff = config.direction.price_diff(entry, price);
    let unrealized_pnl = price_diff * quantity;
    let pnl_percent = price_diff / entry * 100.0;

    // Sized against the static stop so breakeven moves do not change R.
    let risk_distance = config.stop_loss.map(|sl| (entry - sl).abs()).unwrap_or(0.0);
    let risk_amount = risk_distance * quantity;
    let reward_amount = config
        .take_profit
        .map(|tp| (tp - entry).abs() * quantity)
        .unwrap_or(0.0);

    let (risk_reward_ratio, r_multiple, trigger_price) = if risk_amount > 0.0 {
        let offset = risk_distance * config.rr_trigger.profit_threshold;
        let trigger_price = match config.direction {
            Direction::Long => entry + offset,
            Direction::Short => entry - offset,
        };
        (
            reward_amount / risk_amount,
            unrealized_pnl / risk_amount,
            trigger_price,
        )
    } else {
        (0.0, 0.0, entry)
    };

    // Zero risk puts the trigger at entry, so it fires as soon as price is at or past entry
    let condition = config.rr_trigger.enabled
        && match config.direction {
            Direction::Long => price >= trigger_price,
            Direction::Short => price <= trigger_price,
        };

    let trigger_state = match (config.rr_trigger.enabled, config.rr_trigger.mode, prior) {
        (false, _, _) => TriggerState::Disabled,
        (true, TriggerMode::Latched, TriggerState::Fired) => TriggerState::Fired,
        (true, _, _) if condition => TriggerState::Fired,
        (true, _, _) => TriggerState::Armed,
    };

    let effective_stop_loss = if trigger_state == TriggerState::Fired {
        Some(entry)
    } else {
        config.stop_loss
    };

    PositionState {
        config,
        current_price: price,
        unrealized_pnl,
        pnl_percent,
        risk_amount,
        reward_amount,
        risk_reward_ratio,
        r_multiple,
        trigger_price,
        trigger_state,
        effective_stop_loss,
    }
}

impl PositionState {
    /// Next snapshot for `price`; see [`on_tick`]
    pub fn apply(&self, price: f64) -> PositionState {
        on_tick(self, price)
    }

    /// Static configuration
    pub fn config(&self) -> &PositionConfig {
        &self.config
    }

    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    pub fn direction(&self) -> Direction {
        self.config.direction
    }

    pub fn entry_price(&self) -> f64 {
        self.config.entry_price
    }

    pub fn quantity(&self) -> f64 {
        self.config.quantity
    }

    /// Configured stop-loss, unaffected by the trigger
    pub fn stop_loss(&self) -> Option<f64> {
        self.config.stop_loss
    }

    pub fn take_profit(&self) -> Option<f64> {
        self.config.take_profit
    }

    /// Price of the last tick (entry price before any tick)
    pub fn current_price(&self) -> f64 {
        self.current_price
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.unrealized_pnl
    }

    pub fn pnl_percent(&self) -> f64 {
        self.pnl_percent
    }

    /// Initial risk: distance to the static stop times quantity
    pub fn risk_amount(&self) -> f64 {
        self.risk_amount
    }

    pub fn reward_amount(&self) -> f64 {
        self.reward_amount
    }

    /// Reward over risk, 0 when there is no risk
    pub fn risk_reward_ratio(&self) -> f64 {
        self.risk_reward_ratio
    }

    /// Unrealized P&L in multiples of initial risk
    pub fn r_multiple(&self) -> f64 {
        self.r_multiple
    }

    /// Price at which the RR-trigger fires
    pub fn trigger_price(&self) -> f64 {
        self.trigger_price
    }

    pub fn trigger_state(&self) -> TriggerState {
        self.trigger_state
    }

    /// True once the stop has been moved to breakeven
    pub fn rr_trigger_active(&self) -> bool {
        self.trigger_state == TriggerState::Fired
    }

    /// Stop-loss in force: breakeven after the trigger fired, static otherwise
    pub fn effective_stop_loss(&self) -> Option<f64> {
        self.effective_stop_loss
    }
}
