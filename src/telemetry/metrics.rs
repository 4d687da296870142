//! Prometheus metrics

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Price ticks applied to tracked positions
    TicksProcessed,
    /// Inbound frames that failed to decode
    DecodeErrors,
    /// Reconnect attempts scheduled
    Reconnects,
    /// RR-triggers that moved a stop to breakeven
    TriggersFired,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Unrealized P&L summed across tracked positions
    UnrealizedPnl,
    /// Number of tracked positions
    TrackedPositions,
    /// Number of live feed subscriptions
    Subscriptions,
}

impl CounterMetric {
    pub fn name(&self) -> &'static str {
        match self {
            CounterMetric::TicksProcessed => "trade_monitor_ticks_total",
            CounterMetric::DecodeErrors => "trade_monitor_decode_errors_total",
            CounterMetric::Reconnects => "trade_monitor_reconnects_total",
            CounterMetric::TriggersFired => "trade_monitor_triggers_fired_total",
        }
    }
}

impl GaugeMetric {
    pub fn name(&self) -> &'static str {
        match self {
            GaugeMetric::UnrealizedPnl => "trade_monitor_unrealized_pnl",
            GaugeMetric::TrackedPositions => "trade_monitor_tracked_positions",
            GaugeMetric::Subscriptions => "trade_monitor_subscriptions",
        }
    }
}

/// Increment a counter by one
pub fn increment(metric: CounterMetric) {
    metrics::counter!(metric.name()).increment(1);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    metrics::gauge!(metric.name()).set(value);
}

/// Install the Prometheus exporter on `port`
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to start metrics exporter: {}", e))?;

    tracing::info!(%addr, "Prometheus metrics exporter listening");
    Ok(())
}
