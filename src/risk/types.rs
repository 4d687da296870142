//! Risk management types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default RR-trigger threshold, in R-multiples of initial risk
pub const DEFAULT_PROFIT_THRESHOLD: f64 = 1.5;

/// Risk management errors
#[derive(Debug, Error, PartialEq)]
pub enum RiskError {
    /// Position configuration rejected at initialization
    #[error("Invalid configuration: {field} {reason}")]
    InvalidConfiguration { field: &'static str, reason: String },
}

impl RiskError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        RiskError::InvalidConfiguration {
            field,
            reason: reason.into(),
        }
    }
}

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Signed distance from `entry` to `price`, positive when in profit
    pub fn price_diff(&self, entry: f64, price: f64) -> f64 {
        match self {
            Direction::Long => price - entry,
            Direction::Short => entry - price,
        }
    }
}

/// How the RR-trigger treats a price that retraces after firing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    /// Once fired, the stop stays at breakeven for the life of the position
    #[default]
    Latched,
    /// Re-evaluated from the current price on every tick
    Recompute,
}

/// RR-trigger state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerState {
    /// Trigger not enabled for this position
    Disabled,
    /// Enabled, waiting for the threshold
    Armed,
    /// Stop-loss moved to breakeven
    Fired,
}

/// Breakeven trigger settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RrTriggerConfig {
    /// Enable the trigger
    #[serde(default)]
    pub enabled: bool,

    /// Profit needed to fire, in R-multiples of initial risk
    #[serde(default = "default_profit_threshold")]
    pub profit_threshold: f64,

    /// Latching behaviour after firing
    #[serde(default)]
    pub mode: TriggerMode,
}

fn default_profit_threshold() -> f64 {
    DEFAULT_PROFIT_THRESHOLD
}

impl Default for RrTriggerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            profit_threshold: DEFAULT_PROFIT_THRESHOLD,
            mode: TriggerMode::Latched,
        }
    }
}

impl RrTriggerConfig {
    /// Enabled trigger at the given threshold
    pub fn enabled(profit_threshold: f64) -> Self {
        Self {
            enabled: true,
            profit_threshold,
            mode: TriggerMode::Latched,
        }
    }
}

/// Static configuration of one monitored position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionConfig {
    /// Trading symbol
    pub symbol: String,
    /// Long or short
    pub direction: Direction,
    /// Fill price at entry
    pub entry_price: f64,
    /// Position quantity
    pub quantity: f64,
    /// Static stop-loss
    #[serde(default)]
    pub stop_loss: Option<f64>,
    /// Static take-profit
    #[serde(default)]
    pub take_profit: Option<f64>,
    /// Breakeven trigger settings
    #[serde(default)]
    pub rr_trigger: RrTriggerConfig,
}

impl PositionConfig {
    /// Create a config with no stops and the trigger disabled
    pub fn new(symbol: impl Into<String>, direction: Direction, entry_price: f64, quantity: f64) -> Self {
        Self {
            symbol: symbol.into(),
            direction,
            entry_price,
            quantity,
            stop_loss: None,
            take_profit: None,
            rr_trigger: RrTriggerConfig::default(),
        }
    }

    /// Long position
    pub fn long(symbol: impl Into<String>, entry_price: f64, quantity: f64) -> Self {
        Self::new(symbol, Direction::Long, entry_price, quantity)
    }

    /// Short position
    pub fn short(symbol: impl Into<String>, entry_price: f64, quantity: f64) -> Self {
        Self::new(symbol, Direction::Short, entry_price, quantity)
    }

    /// Set the static stop-loss
    pub fn stop_loss(mut self, price: f64) -> Self {
        self.stop_loss = Some(price);
        self
    }

    /// Set the static take-profit
    pub fn take_profit(mut self, price: f64) -> Self {
        self.take_profit = Some(price);
        self
    }

    /// Enable the RR-trigger at the given threshold
    pub fn rr_trigger(mut self, profit_threshold: f64) -> Self {
        self.rr_trigger = RrTriggerConfig {
            profit_threshold,
            enabled: true,
            ..self.rr_trigger
        };
        self
    }

    /// Set the trigger latching mode
    pub fn trigger_mode(mut self, mode: TriggerMode) -> Self {
        self.rr_trigger.mode = mode;
        self
    }

    /// Check the configuration for values the reducer cannot work with
    pub fn validate(&self) -> Result<(), RiskError> {
        if self.symbol.trim().is_empty() {
            return Err(RiskError::invalid("symbol", "must not be empty"));
        }
        if !self.entry_price.is_finite() || self.entry_price <= 0.0 {
            return Err(RiskError::invalid(
                "entry_price",
                format!("must be finite and positive, got {}", self.entry_price),
            ));
        }
        if !self.quantity.is_finite() || self.quantity < 0.0 {
            return Err(RiskError::invalid(
                "quantity",
                format!("must be finite and non-negative, got {}", self.quantity),
            ));
        }
        check_optional_price("stop_loss", self.stop_loss)?;
        check_optional_price("take_profit", self.take_profit)?;

        let threshold = self.rr_trigger.profit_threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(RiskError::invalid(
                "rr_trigger.profit_threshold",
                format!("must be finite and non-negative, got {}", threshold),
            ));
        }
        Ok(())
    }
}

fn check_optional_price(field: &'static str, price: Option<f64>) -> Result<(), RiskError> {
    match price {
        Some(p) if !p.is_finite() || p <= 0.0 => Err(RiskError::invalid(
            field,
            format!("must be finite and positive, got {}", p),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_diff_direction() {
        assert_eq!(Direction::Long.price_diff(100.0, 108.0), 8.0);
        assert_eq!(Direction::Short.price_diff(100.0, 108.0), -8.0);
    }

    #[test]
    fn test_rr_trigger_default() {
        let config = RrTriggerConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.profit_threshold, 1.5);
        assert_eq!(config.mode, TriggerMode::Latched);
    }

    #[test]
    fn test_position_config_builder() {
        let config = PositionConfig::long("BTCUSDT", 100.0, 10.0)
            .stop_loss(95.0)
            .take_profit(120.0)
            .rr_trigger(2.0)
            .trigger_mode(TriggerMode::Recompute);

        assert_eq!(config.direction, Direction::Long);
        assert_eq!(config.stop_loss, Some(95.0));
        assert_eq!(config.take_profit, Some(120.0));
        assert!(config.rr_trigger.enabled);
        assert_eq!(config.rr_trigger.profit_threshold, 2.0);
        assert_eq!(config.rr_trigger.mode, TriggerMode::Recompute);
    }

    #[test]
    fn test_validate_accepts_plain_config() {
        assert!(PositionConfig::short("ETHUSDT", 50.0, 5.0)
            .stop_loss(52.0)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_validate_rejects_negative_quantity() {
        let err = PositionConfig::long("X", 100.0, -1.0).validate().unwrap_err();
        assert!(matches!(
            err,
            RiskError::InvalidConfiguration { field: "quantity", .. }
        ));
    }

    #[test]
    fn test_validate_rejects_non_finite_entry() {
        for entry in [f64::NAN, f64::INFINITY, -5.0, 0.0] {
            let err = PositionConfig::long("X", entry, 1.0).validate().unwrap_err();
            assert!(matches!(
                err,
                RiskError::InvalidConfiguration { field: "entry_price", .. }
            ));
        }
    }

    #[test]
    fn test_validate_rejects_bad_stop() {
        let err = PositionConfig::long("X", 100.0, 1.0)
            .stop_loss(f64::NAN)
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            RiskError::InvalidConfiguration { field: "stop_loss", .. }
        ));
    }

    #[test]
    fn test_validate_rejects_empty_symbol() {
        assert!(PositionConfig::long(" ", 100.0, 1.0).validate().is_err());
    }

    #[test]
    fn test_config_deserialize_defaults() {
        let config: PositionConfig = serde_json::from_str(
            r#"{"symbol":"BTCUSDT","direction":"long","entry_price":100,"quantity":2}"#,
        )
        .unwrap();
        assert_eq!(config.stop_loss, None);
        assert!(!config.rr_trigger.enabled);
        assert_eq!(config.rr_trigger.profit_threshold, 1.5);
    }

    #[test]
    fn test_error_display() {
        let err = RiskError::invalid("quantity", "must be finite");
        assert_eq!(err.to_string(), "Invalid configuration: quantity must be finite");
    }
}
