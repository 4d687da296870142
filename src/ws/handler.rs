//! Subscription callbacks

use super::WsError;
use crate::feed::FeedMessage;
use tokio::sync::mpsc;

/// Callbacks invoked by a subscription's driver task
///
/// Calls are serialized and never run after `close()` has returned. A
/// handler must not close its own subscription from inside a callback.
pub trait SubscriptionHandler: Send + 'static {
    /// Connection established
    fn on_open(&mut self) {}

    /// Decoded message that passed the type filter
    fn on_message(&mut self, message: FeedMessage) {
        let _ = message;
    }

    /// Transport-level failure
    fn on_error(&mut self, error: &WsError) {
        let _ = error;
    }

    /// Connection closed without the owner asking for it
    fn on_close(&mut self) {}
}

/// A subscription callback as a value
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionEvent {
    Opened,
    Message(FeedMessage),
    Error(WsError),
    Closed,
}

/// Handler forwarding every callback into a channel, tagged with `key`
pub struct ChannelHandler<K> {
    key: K,
    tx: mpsc::UnboundedSender<(K, SubscriptionEvent)>,
}

impl<K: Clone + Send + 'static> ChannelHandler<K> {
    /// Forward events tagged with `key` into `tx`
    pub fn new(key: K, tx: mpsc::UnboundedSender<(K, SubscriptionEvent)>) -> Self {
        Self { key, tx }
    }

    fn forward(&self, event: SubscriptionEvent) {
        if self.tx.send((self.key.clone(), event)).is_err() {
            tracing::debug!("Subscription event receiver dropped");
        }
    }
}

impl ChannelHandler<()> {
    /// Untagged handler and its receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<((), SubscriptionEvent)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new((), tx), rx)
    }
}

impl<K: Clone + Send + 'static> SubscriptionHandler for ChannelHandler<K> {
    fn on_open(&mut self) {
        self.forward(SubscriptionEvent::Opened);
    }

    fn on_message(&mut self, message: FeedMessage) {
        self.forward(SubscriptionEvent::Message(message));
    }

    fn on_error(&mut self, error: &WsError) {
        self.forward(SubscriptionEvent::Error(error.clone()));
    }

    fn on_close(&mut self) {
        self.forward(SubscriptionEvent::Closed);
    }
}
