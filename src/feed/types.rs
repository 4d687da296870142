//! Feed message types

use super::{HEARTBEAT, PRICE_UPDATE, TRADE_UPDATE};
use chrono::{DateTime, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// A single price update for a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    /// Trading symbol (e.g., "BTCUSDT")
    pub symbol: String,
    /// Last traded price
    #[serde(deserialize_with = "deserialize_price")]
    pub price: f64,
    /// Traded size, when the feed reports it
    #[serde(default, alias = "volume")]
    pub size: Option<f64>,
    /// Server timestamp
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl PriceTick {
    /// Create a tick without size or timestamp
    pub fn new(symbol: impl Into<String>, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            size: None,
            timestamp: None,
        }
    }
}

/// Lifecycle status of a trade as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Open,
    Closed,
    Cancelled,
}

impl TradeStatus {
    /// Whether monitoring should stop for a trade in this status
    pub fn is_terminal(&self) -> bool {
        matches!(self, TradeStatus::Closed | TradeStatus::Cancelled)
    }
}

/// Trade lifecycle change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeUpdate {
    /// Trade (position) identifier
    #[serde(alias = "id")]
    pub trade_id: Uuid,
    /// New status
    pub status: TradeStatus,
}

/// A decoded feed frame, discriminated by its `type` field
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    /// `price_update`
    PriceUpdate(PriceTick),
    /// `trade_update`
    TradeUpdate(TradeUpdate),
    /// `heartbeat`
    Heartbeat,
    /// Any type this crate does not model
    Unknown {
        kind: String,
        data: serde_json::Value,
    },
}

impl FeedMessage {
    /// The wire discriminator of this message
    pub fn kind(&self) -> &str {
        match self {
            FeedMessage::PriceUpdate(_) => PRICE_UPDATE,
            FeedMessage::TradeUpdate(_) => TRADE_UPDATE,
            FeedMessage::Heartbeat => HEARTBEAT,
            FeedMessage::Unknown { kind, .. } => kind,
        }
    }
}

/// Prices arrive as JSON numbers from most feeds and as strings from some
#[derive(Deserialize)]
#[serde(untagged)]
enum RawPrice {
    Number(f64),
    Text(String),
}

fn deserialize_price<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match RawPrice::deserialize(deserializer)? {
        RawPrice::Number(price) => Ok(price),
        RawPrice::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|e| de::Error::custom(format!("invalid price {:?}: {}", text, e))),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(i64),
    Text(String),
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawTimestamp>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawTimestamp::Millis(ms)) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {}", ms))),
        Some(RawTimestamp::Text(text)) => DateTime::parse_from_rfc3339(&text)
            .map(|ts| Some(ts.with_timezone(&Utc)))
            .map_err(de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_tick_from_numbers() {
        let tick: PriceTick =
            serde_json::from_str(r#"{"symbol":"BTCUSDT","price":42500.5,"size":0.25}"#).unwrap();
        assert_eq!(tick.symbol, "BTCUSDT");
        assert_eq!(tick.price, 42500.5);
        assert_eq!(tick.size, Some(0.25));
        assert!(tick.timestamp.is_none());
    }

    #[test]
    fn test_price_tick_string_price_and_volume_alias() {
        let tick: PriceTick =
            serde_json::from_str(r#"{"symbol":"ETHUSDT","price":"2300.10","volume":3}"#).unwrap();
        assert_eq!(tick.price, 2300.10);
        assert_eq!(tick.size, Some(3.0));
    }

    #[test]
    fn test_price_tick_timestamp_millis() {
        let tick: PriceTick =
            serde_json::from_str(r#"{"symbol":"X","price":1,"timestamp":1704067200123}"#).unwrap();
        let ts = tick.timestamp.unwrap();
        assert_eq!(ts.timestamp_millis(), 1704067200123);
    }

    #[test]
    fn test_price_tick_timestamp_rfc3339() {
        let tick: PriceTick = serde_json::from_str(
            r#"{"symbol":"X","price":1,"timestamp":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(tick.timestamp.unwrap().timestamp(), 1704067200);
    }

    #[test]
    fn test_price_tick_rejects_bad_price() {
        let result = serde_json::from_str::<PriceTick>(r#"{"symbol":"X","price":"abc"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_trade_status_terminal() {
        assert!(!TradeStatus::Open.is_terminal());
        assert!(TradeStatus::Closed.is_terminal());
        assert!(TradeStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_message_kind() {
        assert_eq!(
            FeedMessage::PriceUpdate(PriceTick::new("X", 1.0)).kind(),
            "price_update"
        );
        assert_eq!(FeedMessage::Heartbeat.kind(), "heartbeat");
        let unknown = FeedMessage::Unknown {
            kind: "order_book".to_string(),
            data: serde_json::Value::Null,
        };
        assert_eq!(unknown.kind(), "order_book");
    }
}
