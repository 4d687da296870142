//! Streaming client
//!
//! One logical subscription to a feed endpoint with fixed-delay
//! reconnection, typed message dispatch, and connectivity status.

mod client;
mod handler;
mod memory;
mod transport;
mod types;

pub use client::Subscription;
pub use handler::{ChannelHandler, SubscriptionEvent, SubscriptionHandler};
pub use memory::{MemoryConnector, ScriptStep, Session};
pub use transport::{Connection, Connector, Inbound, TungsteniteConnector};
pub use types::{
    ConnectionStatus, SendStatus, SubscriptionOptions, WsError, DEFAULT_MAX_RECONNECT_ATTEMPTS,
    DEFAULT_RECONNECT_DELAY,
};
