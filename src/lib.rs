//! trade-monitor: Real-time position monitoring over a streaming price feed
//!
//! This library provides the core components for:
//! - Resilient WebSocket subscriptions with bounded reconnection
//! - Decoding of typed feed messages
//! - Position risk metrics with an RR-trigger that moves the stop to breakeven
//! - A monitor that fans price ticks out to tracked positions
//! - Structured logging and Prometheus metrics

pub mod cli;
pub mod config;
pub mod feed;
pub mod monitor;
pub mod risk;
pub mod telemetry;
pub mod ws;
