//! Frame decoding

use super::{FeedMessage, HEARTBEAT, PRICE_UPDATE, TRADE_UPDATE};
use serde::Deserialize;
use thiserror::Error;

/// Frame decoding errors
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not JSON, or no string `type` field
    #[error("Malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),
    /// Known message type whose payload does not match its shape
    #[error("Invalid {kind} payload: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Decode one UTF-8 text frame into a typed message
pub fn decode(text: &str) -> Result<FeedMessage, DecodeError> {
    let Envelope { kind, data } = serde_json::from_str(text).map_err(DecodeError::Malformed)?;

    let message = match kind.as_str() {
        PRICE_UPDATE => FeedMessage::PriceUpdate(
            serde_json::from_value(data).map_err(|source| DecodeError::Payload { kind, source })?,
        ),
        TRADE_UPDATE => FeedMessage::TradeUpdate(
            serde_json::from_value(data).map_err(|source| DecodeError::Payload { kind, source })?,
        ),
        HEARTBEAT => FeedMessage::Heartbeat,
        _ => FeedMessage::Unknown { kind, data },
    };

    Ok(message)
}
