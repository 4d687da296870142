//! Feed message model
//!
//! Typed view of the frames a price/event feed sends: every frame is a
//! `{"type": ..., "data": ...}` envelope decoded into [`FeedMessage`].

mod codec;
mod types;

pub use codec::{decode, DecodeError};
pub use types::{FeedMessage, PriceTick, TradeStatus, TradeUpdate};

/// Discriminator for price updates
pub const PRICE_UPDATE: &str = "price_update";
/// Discriminator for trade lifecycle updates
pub const TRADE_UPDATE: &str = "trade_update";
/// Discriminator for keepalive frames
pub const HEARTBEAT: &str = "heartbeat";
