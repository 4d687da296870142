//! Position book: fans one tick out to every position on its symbol

use crate::feed::PriceTick;
use crate::risk::{self, PositionConfig, PositionState, RiskError};
use crate::telemetry::{increment, CounterMetric};
use std::collections::HashMap;
use uuid::Uuid;

/// Position identifier
pub type PositionId = Uuid;

/// New snapshot for one position after a tick
#[derive(Debug, Clone, PartialEq)]
pub struct PositionUpdate {
    /// Position identifier
    pub id: PositionId,
    /// Snapshot after the tick
    pub state: PositionState,
    /// True only on the tick that fired the RR-trigger
    pub fired: bool,
}

/// Latest snapshot of every monitored position
///
/// Each position has its own independent reducer state; nothing is shared
/// between positions except the tick that drives them.
#[derive(Debug, Default)]
pub struct PositionBook {
    positions: HashMap<PositionId, PositionState>,
    /// Open order, so fan-out is deterministic
    order: Vec<PositionId>,
}

impl PositionBook {
    /// Create an empty book
    pub fn new() -> Self {
        Self::default()
    }

    /// Start monitoring a position under a fresh id
    pub fn open(&mut self, config: PositionConfig) -> Result<PositionId, RiskError> {
        let id = Uuid::new_v4();
        self.open_with_id(id, config)?;
        Ok(id)
    }

    /// Start monitoring a position under `id`, replacing any position with that id
    pub fn open_with_id(
        &mut self,
        id: PositionId,
        config: PositionConfig,
    ) -> Result<PositionState, RiskError> {
        let state = risk::initialize(config)?;

        if self.positions.insert(id, state.clone()).is_some() {
            tracing::warn!(%id, "Replacing tracked position with the same id");
        } else {
            self.order.push(id);
        }

        tracing::info!(
            %id,
            symbol = state.symbol(),
            direction = ?state.direction(),
            entry = state.entry_price(),
            quantity = state.quantity(),
            "Tracking position"
        );
        Ok(state)
    }

    /// Stop monitoring a position, returning its last snapshot
    pub fn close(&mut self, id: PositionId) -> Option<PositionState> {
        let state = self.positions.remove(&id)?;
        self.order.retain(|other| *other != id);
        tracing::info!(%id, symbol = state.symbol(), "Stopped tracking position");
        Some(state)
    }

    /// Latest snapshot of a position
    pub fn get(&self, id: PositionId) -> Option<&PositionState> {
        self.positions.get(&id)
    }

    /// Whether `id` is tracked
    pub fn contains(&self, id: PositionId) -> bool {
        self.positions.contains_key(&id)
    }

    /// Apply a tick to every position on its symbol, in open order
    pub fn apply_tick(&mut self, tick: &PriceTick) -> Vec<PositionUpdate> {
        let mut updates = Vec::new();

        for id in &self.order {
            let Some(state) = self.positions.get_mut(id) else {
                continue;
            };
            if !state.symbol().eq_ignore_ascii_case(&tick.symbol) {
                continue;
            }

            let next = risk::on_tick(state, tick.price);
            let fired = !state.rr_trigger_active() && next.rr_trigger_active();
            if fired {
                increment(CounterMetric::TriggersFired);
                tracing::info!(
                    %id,
                    symbol = next.symbol(),
                    price = tick.price,
                    stop = ?next.effective_stop_loss(),
                    "RR-trigger fired, stop moved to breakeven"
                );
            }

            *state = next.clone();
            updates.push(PositionUpdate {
                id: *id,
                state: next,
                fired,
            });
        }

        if !updates.is_empty() {
            increment(CounterMetric::TicksProcessed);
        }
        updates
    }

    /// Distinct symbols with at least one position, in open order
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = Vec::new();
        for state in self.iter().map(|(_, state)| state) {
            if !symbols.iter().any(|s| s.eq_ignore_ascii_case(state.symbol())) {
                symbols.push(state.symbol().to_string());
            }
        }
        symbols
    }

    /// Whether any position trades `symbol`
    pub fn has_symbol(&self, symbol: &str) -> bool {
        self.positions
            .values()
            .any(|state| state.symbol().eq_ignore_ascii_case(symbol))
    }

    /// Positions in open order
    pub fn iter(&self) -> impl Iterator<Item = (PositionId, &PositionState)> + '_ {
        self.order
            .iter()
            .filter_map(|id| self.positions.get(id).map(|state| (*id, state)))
    }

    /// Unrealized P&L across all positions
    pub fn total_unrealized_pnl(&self) -> f64 {
        self.positions.values().map(|s| s.unrealized_pnl()).sum()
    }

    /// Number of tracked positions
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether no positions are tracked
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
