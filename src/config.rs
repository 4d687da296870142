//! Configuration types for trade-monitor

use crate::risk::PositionConfig;
use crate::telemetry::LogFormat;
use crate::ws::{SubscriptionOptions, DEFAULT_MAX_RECONNECT_ATTEMPTS};
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

/// Placeholder in the feed URL replaced by the lowercase symbol
pub const SYMBOL_PLACEHOLDER: &str = "{symbol}";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub feed: FeedConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub positions: Vec<TrackedPosition>,
}

/// Price feed configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Feed endpoint; `{symbol}` is replaced per subscription
    pub url: String,

    /// Reconnect attempts before a subscription gives up
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Fixed delay between reconnect attempts (milliseconds)
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Message types to subscribe to; empty delivers everything
    #[serde(default = "default_message_types")]
    pub message_types: Vec<String>,
}

fn default_max_reconnect_attempts() -> u32 {
    DEFAULT_MAX_RECONNECT_ATTEMPTS
}
fn default_reconnect_delay_ms() -> u64 {
    3000
}
fn default_message_types() -> Vec<String> {
    vec!["price_update".to_string(), "trade_update".to_string()]
}

impl FeedConfig {
    /// Config for `url` with default reconnect settings
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            message_types: default_message_types(),
        }
    }

    /// Endpoint for one symbol's subscription
    pub fn target_for(&self, symbol: &str) -> String {
        self.url
            .replace(SYMBOL_PLACEHOLDER, &symbol.to_lowercase())
    }

    /// Streaming client options
    pub fn subscription_options(&self) -> SubscriptionOptions {
        SubscriptionOptions::new()
            .max_reconnects(self.max_reconnect_attempts)
            .reconnect_delay(Duration::from_millis(self.reconnect_delay_ms))
            .message_types(self.message_types.iter().cloned())
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Prometheus exporter port; disabled when absent
    #[serde(default)]
    pub metrics_port: Option<u16>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_port: None,
            log_level: default_log_level(),
            log_format: LogFormat::Pretty,
        }
    }
}

/// A position to monitor from startup
#[derive(Debug, Clone, Deserialize)]
pub struct TrackedPosition {
    /// Trade id used to match `trade_update` messages; generated when absent
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(flatten)]
    pub position: PositionConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Check the feed options and every position
    pub fn validate(&self) -> anyhow::Result<()> {
        self.feed.subscription_options().validate()?;
        for (index, tracked) in self.positions.iter().enumerate() {
            tracked
                .position
                .validate()
                .map_err(|e| anyhow::anyhow!("positions[{}]: {}", index, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::{Direction, TriggerMode};
    use std::io::Write;

    const FULL: &str = r#"
        [feed]
        url = "wss://feed.example.com/ws/prices/{symbol}"
        max_reconnect_attempts = 3
        reconnect_delay_ms = 500

        [telemetry]
        metrics_port = 9090
        log_level = "debug"
        log_format = "json"

        [[positions]]
        id = "6f1c1d8e-3a53-4b43-9d0e-2b4b3c8a9f10"
        symbol = "BTCUSDT"
        direction = "long"
        entry_price = 100
        quantity = 10
        stop_loss = 95
        rr_trigger = { enabled = true, profit_threshold = 1.5 }

        [[positions]]
        symbol = "ETHUSDT"
        direction = "short"
        entry_price = 50.0
        quantity = 5.0
        stop_loss = 52.0
        take_profit = 45.0
        rr_trigger = { enabled = true, mode = "recompute" }
    "#;

    #[test]
    fn test_config_deserialize() {
        let config: Config = toml::from_str(FULL).unwrap();

        assert_eq!(config.feed.max_reconnect_attempts, 3);
        assert_eq!(config.feed.reconnect_delay_ms, 500);
        assert_eq!(config.telemetry.metrics_port, Some(9090));
        assert_eq!(config.telemetry.log_format, LogFormat::Json);
        assert_eq!(config.positions.len(), 2);

        let btc = &config.positions[0];
        assert!(btc.id.is_some());
        assert_eq!(btc.position.direction, Direction::Long);
        assert_eq!(btc.position.entry_price, 100.0);
        assert!(btc.position.rr_trigger.enabled);

        let eth = &config.positions[1];
        assert!(eth.id.is_none());
        assert_eq!(eth.position.take_profit, Some(45.0));
        assert_eq!(eth.position.rr_trigger.profit_threshold, 1.5);
        assert_eq!(eth.position.rr_trigger.mode, TriggerMode::Recompute);

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_defaults() {
        let config: Config = toml::from_str(
            r#"
            [feed]
            url = "ws://localhost:8000/ws"
            "#,
        )
        .unwrap();

        assert_eq!(config.feed.max_reconnect_attempts, 5);
        assert_eq!(config.feed.reconnect_delay_ms, 3000);
        assert_eq!(
            config.feed.message_types,
            vec!["price_update".to_string(), "trade_update".to_string()]
        );
        assert_eq!(config.telemetry.log_level, "info");
        assert!(config.telemetry.metrics_port.is_none());
        assert!(config.positions.is_empty());
    }

    #[test]
    fn test_target_for_symbol() {
        let feed = FeedConfig::new("wss://feed.example.com/ws/prices/{symbol}");
        assert_eq!(
            feed.target_for("BTCUSDT"),
            "wss://feed.example.com/ws/prices/btcusdt"
        );

        let shared = FeedConfig::new("ws://localhost:8000/ws");
        assert_eq!(shared.target_for("BTCUSDT"), "ws://localhost:8000/ws");
    }

    #[test]
    fn test_subscription_options_from_feed() {
        let mut feed = FeedConfig::new("ws://localhost");
        feed.reconnect_delay_ms = 100;
        feed.max_reconnect_attempts = 2;

        let options = feed.subscription_options();
        assert_eq!(options.max_reconnect_attempts, 2);
        assert_eq!(options.reconnect_delay, Duration::from_millis(100));
        assert!(options.accepts("trade_update"));
        assert!(!options.accepts("heartbeat"));
    }

    #[test]
    fn test_validate_rejects_bad_position() {
        let config: Config = toml::from_str(
            r#"
            [feed]
            url = "ws://localhost"

            [[positions]]
            symbol = "BTCUSDT"
            direction = "long"
            entry_price = 100
            quantity = -1
            "#,
        )
        .unwrap();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("positions[0]"));
    }

    #[test]
    fn test_validate_rejects_zero_delay() {
        let mut config: Config = toml::from_str("[feed]\nurl = \"ws://localhost\"").unwrap();
        config.feed.reconnect_delay_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.positions.len(), 2);
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(result.is_err());
    }
}
