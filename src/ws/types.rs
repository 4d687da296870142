//! Streaming client types and configuration

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default bound on consecutive reconnect attempts
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
/// Default fixed delay between reconnect attempts
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Subscription configuration
#[derive(Debug, Clone)]
pub struct SubscriptionOptions {
    /// Reconnect attempts after unexpected closures before giving up (0 = never reconnect)
    pub max_reconnect_attempts: u32,
    /// Fixed delay before each reconnect attempt
    pub reconnect_delay: Duration,
    /// Message types to deliver; empty delivers everything
    pub message_types: Vec<String>,
}

impl Default for SubscriptionOptions {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            message_types: Vec::new(),
        }
    }
}

impl SubscriptionOptions {
    /// Default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum reconnection attempts
    pub fn max_reconnects(mut self, n: u32) -> Self {
        self.max_reconnect_attempts = n;
        self
    }

    /// Set the reconnect delay
    pub fn reconnect_delay(mut self, d: Duration) -> Self {
        self.reconnect_delay = d;
        self
    }

    /// Set the reconnect delay in milliseconds
    pub fn reconnect_delay_ms(self, ms: u64) -> Self {
        self.reconnect_delay(Duration::from_millis(ms))
    }

    /// Restrict delivery to the given message types
    pub fn message_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.message_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Reject options the client cannot run with
    pub fn validate(&self) -> Result<(), WsError> {
        if self.reconnect_delay.is_zero() {
            return Err(WsError::InvalidOptions(
                "reconnect delay must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Whether a message of this type passes the filter
    pub fn accepts(&self, kind: &str) -> bool {
        self.message_types.is_empty() || self.message_types.iter().any(|t| t == kind)
    }

    /// Control frame announcing the filter to the server, if there is one
    pub fn subscribe_frame(&self) -> Option<String> {
        if self.message_types.is_empty() {
            return None;
        }
        Some(
            serde_json::json!({
                "action": "subscribe",
                "types": self.message_types,
            })
            .to_string(),
        )
    }
}

/// Connectivity of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Connection attempt in flight
    Connecting,
    /// Connected, frames are flowing
    Open,
    /// Disconnected (reconnect pending, exhausted, or closed by the owner)
    Closed,
    /// Transport reported an error on a live connection
    Errored,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Open => "open",
            ConnectionStatus::Closed => "closed",
            ConnectionStatus::Errored => "errored",
        };
        f.write_str(s)
    }
}

/// Outcome of [`Subscription::send`](super::Subscription::send)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum SendStatus {
    /// Handed to the open connection
    Sent,
    /// Not open; the payload was dropped
    NotOpen,
}

/// Streaming client errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WsError {
    /// Connection attempt failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    /// Error on a live connection
    #[error("Transport error: {0}")]
    Transport(String),
    /// Outbound frame could not be written
    #[error("Send failed: {0}")]
    SendFailed(String),
    /// Outbound payload could not be serialized
    #[error("Serialization failed: {0}")]
    Serialize(String),
    /// Options rejected at open
    #[error("Invalid subscription options: {0}")]
    InvalidOptions(String),
}
