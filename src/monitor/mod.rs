//! Trade monitoring
//!
//! Fans decoded price ticks out to per-position reducers, with one feed
//! subscription shared by every position on the same symbol.

mod book;
mod service;

pub use book::{PositionBook, PositionId, PositionUpdate};
pub use service::{MonitorUpdate, TradeMonitor};

use crate::risk::RiskError;
use crate::ws::WsError;
use thiserror::Error;

/// Trade monitor errors
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Position configuration rejected
    #[error(transparent)]
    Risk(#[from] RiskError),
    /// Subscription could not be opened
    #[error(transparent)]
    Subscription(#[from] WsError),
}
