//! Position risk module
//!
//! Derived risk metrics and the RR-trigger (move stop to breakeven) state
//! machine for a single position, recomputed deterministically per tick.

mod position;
mod types;

pub use position::{initialize, on_tick, PositionState};
pub use types::{
    Direction, PositionConfig, RiskError, RrTriggerConfig, TriggerMode, TriggerState,
    DEFAULT_PROFIT_THRESHOLD,
};
