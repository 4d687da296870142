//! Trade monitor: shared per-symbol subscriptions feeding the position book

use super::book::{PositionBook, PositionId, PositionUpdate};
use super::MonitorError;
use crate::config::FeedConfig;
use crate::feed::{FeedMessage, PriceTick, TradeUpdate};
use crate::risk::{PositionConfig, PositionState};
use crate::telemetry::{set_gauge, GaugeMetric};
use crate::ws::{ChannelHandler, ConnectionStatus, Connector, Subscription, SubscriptionEvent};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError};
use uuid::Uuid;

/// Something the monitor wants rendered
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorUpdate {
    /// New snapshot for a position
    Position(PositionUpdate),
    /// Connectivity change or transport error on a symbol's subscription
    Connection {
        symbol: String,
        status: ConnectionStatus,
    },
    /// Position removed after its trade closed
    Untracked { id: PositionId, state: PositionState },
}

/// Monitors many positions over one subscription per symbol
///
/// Subscription callbacks are forwarded into a single channel and applied in
/// receipt order by [`next_update`](Self::next_update), so each position sees
/// its symbol's ticks in the order the transport delivered them.
pub struct TradeMonitor {
    feed: FeedConfig,
    connector: Arc<dyn Connector>,
    book: PositionBook,
    subscriptions: HashMap<String, SymbolFeed>,
    /// Bumped per opened subscription so events from released ones can be told apart
    generation: u64,
    events_tx: mpsc::UnboundedSender<(FeedKey, SubscriptionEvent)>,
    events_rx: mpsc::UnboundedReceiver<(FeedKey, SubscriptionEvent)>,
    pending: VecDeque<MonitorUpdate>,
}

/// Symbol and generation a subscription's events are tagged with
type FeedKey = (String, u64);

struct SymbolFeed {
    generation: u64,
    subscription: Subscription,
}

fn subscription_key(symbol: &str) -> String {
    symbol.to_uppercase()
}

impl TradeMonitor {
    /// Create a monitor with no positions
    pub fn new(feed: FeedConfig, connector: Arc<dyn Connector>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            feed,
            connector,
            book: PositionBook::new(),
            subscriptions: HashMap::new(),
            generation: 0,
            events_tx,
            events_rx,
            pending: VecDeque::new(),
        }
    }

    /// Start monitoring a position under a fresh id
    pub fn track(&mut self, config: PositionConfig) -> Result<PositionId, MonitorError> {
        let id = Uuid::new_v4();
        self.track_with_id(id, config)?;
        Ok(id)
    }

    /// Start monitoring a position under `id`, subscribing to its symbol if needed
    ///
    /// An existing position with the same id is replaced; if that moves the
    /// last position off another symbol, that symbol's subscription is closed.
    /// Must be called within a tokio runtime.
    pub fn track_with_id(
        &mut self,
        id: PositionId,
        config: PositionConfig,
    ) -> Result<PositionState, MonitorError> {
        config.validate()?;
        self.ensure_subscription(&config.symbol)?;

        let replaced = self.book.get(id).map(|prior| prior.symbol().to_string());
        let state = self.book.open_with_id(id, config)?;
        if let Some(symbol) = replaced {
            self.release_if_unused(&symbol);
        }

        self.record_gauges();
        Ok(state)
    }

    /// Stop monitoring a position; the symbol's subscription closes with its last position
    pub fn untrack(&mut self, id: PositionId) -> Option<PositionState> {
        let state = self.book.close(id)?;
        self.release_if_unused(state.symbol());
        self.record_gauges();
        Some(state)
    }

    /// Tracked positions
    pub fn book(&self) -> &PositionBook {
        &self.book
    }

    /// Connectivity of a symbol's subscription
    pub fn connection_status(&self, symbol: &str) -> Option<ConnectionStatus> {
        self.subscriptions
            .get(&subscription_key(symbol))
            .map(|feed| feed.subscription.status())
    }

    /// Number of live subscriptions
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Next update to render
    ///
    /// Returns `None` once there is nothing left to wait for: no subscriptions,
    /// or every subscription gave up reconnecting.
    pub async fn next_update(&mut self) -> Option<MonitorUpdate> {
        loop {
            if let Some(update) = self.pending.pop_front() {
                return Some(update);
            }

            let event = match self.events_rx.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) if self.is_idle() => return None,
                Err(TryRecvError::Empty) => self.events_rx.recv().await?,
                Err(TryRecvError::Disconnected) => return None,
            };

            let (key, event) = event;
            self.handle_event(key, event);
        }
    }

    /// Close every subscription; positions stay in the book
    pub fn shutdown(&mut self) {
        for (symbol, feed) in self.subscriptions.drain() {
            feed.subscription.close();
            tracing::debug!(%symbol, "Subscription shut down");
        }
        self.record_gauges();
    }

    fn is_idle(&self) -> bool {
        self.subscriptions
            .values()
            .all(|feed| feed.subscription.is_exhausted())
    }

    fn ensure_subscription(&mut self, symbol: &str) -> Result<(), MonitorError> {
        let key = subscription_key(symbol);
        if self.subscriptions.contains_key(&key) {
            return Ok(());
        }

        self.generation += 1;
        let generation = self.generation;
        let target = self.feed.target_for(symbol);
        let handler = ChannelHandler::new((key.clone(), generation), self.events_tx.clone());
        let subscription = Subscription::open(
            target.clone(),
            self.feed.subscription_options(),
            handler,
            Arc::clone(&self.connector),
        )?;

        tracing::info!(symbol = %key, url = %target, generation, "Subscribed to symbol feed");
        self.subscriptions.insert(
            key,
            SymbolFeed {
                generation,
                subscription,
            },
        );
        Ok(())
    }

    fn release_if_unused(&mut self, symbol: &str) {
        if self.book.has_symbol(symbol) {
            return;
        }
        let key = subscription_key(symbol);
        if let Some(feed) = self.subscriptions.remove(&key) {
            feed.subscription.close();
            tracing::info!(symbol = %key, "No positions left on symbol, subscription closed");
        }
    }

    fn handle_event(&mut self, (symbol, generation): FeedKey, event: SubscriptionEvent) {
        let subscription = match self.subscriptions.get(&symbol) {
            Some(feed) if feed.generation == generation => &feed.subscription,
            _ => {
                tracing::trace!(%symbol, generation, "Event from a released subscription");
                return;
            }
        };

        match event {
            SubscriptionEvent::Opened => self.pending.push_back(MonitorUpdate::Connection {
                symbol,
                status: ConnectionStatus::Open,
            }),
            SubscriptionEvent::Closed => {
                if subscription.is_exhausted() {
                    tracing::error!(%symbol, "Feed disconnected permanently");
                }
                self.pending.push_back(MonitorUpdate::Connection {
                    symbol,
                    status: ConnectionStatus::Closed,
                });
            }
            SubscriptionEvent::Error(e) => {
                tracing::warn!(%symbol, error = %e, "Feed error");
                self.pending.push_back(MonitorUpdate::Connection {
                    symbol,
                    status: ConnectionStatus::Errored,
                });
            }
            SubscriptionEvent::Message(FeedMessage::PriceUpdate(tick)) => {
                self.on_price(&symbol, tick)
            }
            SubscriptionEvent::Message(FeedMessage::TradeUpdate(update)) => {
                self.on_trade_update(update)
            }
            SubscriptionEvent::Message(FeedMessage::Heartbeat) => {
                tracing::trace!(%symbol, "Heartbeat");
            }
            SubscriptionEvent::Message(FeedMessage::Unknown { kind, .. }) => {
                tracing::debug!(%symbol, %kind, "Ignoring unhandled message type");
            }
        }
    }

    fn on_price(&mut self, symbol: &str, tick: PriceTick) {
        if !tick.symbol.eq_ignore_ascii_case(symbol) {
            tracing::trace!(subscription = %symbol, tick = %tick.symbol, "Tick for another symbol");
            return;
        }

        let updates = self.book.apply_tick(&tick);
        if updates.is_empty() {
            return;
        }
        set_gauge(GaugeMetric::UnrealizedPnl, self.book.total_unrealized_pnl());
        self.pending
            .extend(updates.into_iter().map(MonitorUpdate::Position));
    }

    fn on_trade_update(&mut self, update: TradeUpdate) {
        if !update.status.is_terminal() || !self.book.contains(update.trade_id) {
            return;
        }
        tracing::info!(id = %update.trade_id, status = ?update.status, "Trade finished");
        if let Some(state) = self.untrack(update.trade_id) {
            self.pending.push_back(MonitorUpdate::Untracked {
                id: update.trade_id,
                state,
            });
        }
    }

    fn record_gauges(&self) {
        set_gauge(GaugeMetric::TrackedPositions, self.book.len() as f64);
        set_gauge(GaugeMetric::Subscriptions, self.subscriptions.len() as f64);
    }
}

impl Drop for TradeMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::{MemoryConnector, ScriptStep};
    use std::time::Duration;

    fn feed() -> FeedConfig {
        let mut feed = FeedConfig::new("mem://prices/{symbol}");
        feed.reconnect_delay_ms = 10;
        feed
    }

    fn price(symbol: &str, price: f64) -> ScriptStep {
        ScriptStep::Frame(format!(
            r#"{{"type":"price_update","data":{{"symbol":"{}","price":{}}}}}"#,
            symbol, price
        ))
    }

    async fn next(monitor: &mut TradeMonitor) -> MonitorUpdate {
        tokio::time::timeout(Duration::from_secs(5), monitor.next_update())
            .await
            .expect("Test timed out")
            .expect("Monitor finished")
    }

    #[tokio::test]
    async fn test_one_subscription_per_symbol() {
        let connector = Arc::new(MemoryConnector::replaying(vec![]));
        let mut monitor = TradeMonitor::new(feed(), connector.clone());

        monitor.track(PositionConfig::long("BTCUSDT", 100.0, 1.0)).unwrap();
        monitor.track(PositionConfig::short("btcusdt", 100.0, 1.0)).unwrap();
        monitor.track(PositionConfig::long("ETHUSDT", 50.0, 1.0)).unwrap();

        assert_eq!(monitor.subscription_count(), 2);
        assert_eq!(monitor.book().len(), 3);
    }

    #[tokio::test]
    async fn test_track_rejects_invalid_config() {
        let connector = Arc::new(MemoryConnector::new());
        let mut monitor = TradeMonitor::new(feed(), connector.clone());

        let result = monitor.track(PositionConfig::long("BTCUSDT", 0.0, 1.0));
        assert!(matches!(result, Err(MonitorError::Risk(_))));
        assert_eq!(monitor.subscription_count(), 0);
        assert_eq!(connector.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_ticks_update_positions() {
        let connector = Arc::new(MemoryConnector::new().accept(vec![
            price("BTCUSDT", 100.0),
            price("BTCUSDT", 108.0),
            price("BTCUSDT", 103.0),
        ]));
        let mut monitor = TradeMonitor::new(feed(), connector);
        let id = monitor
            .track(
                PositionConfig::long("BTCUSDT", 100.0, 10.0)
                    .stop_loss(95.0)
                    .rr_trigger(1.5),
            )
            .unwrap();

        assert_eq!(
            next(&mut monitor).await,
            MonitorUpdate::Connection {
                symbol: "BTCUSDT".into(),
                status: ConnectionStatus::Open
            }
        );

        let mut fired = Vec::new();
        for _ in 0..3 {
            match next(&mut monitor).await {
                MonitorUpdate::Position(update) => {
                    assert_eq!(update.id, id);
                    fired.push(update.fired);
                }
                other => panic!("unexpected update: {:?}", other),
            }
        }
        assert_eq!(fired, vec![false, true, false]);

        let state = monitor.book().get(id).unwrap();
        assert_eq!(state.current_price(), 103.0);
        assert_eq!(state.effective_stop_loss(), Some(100.0));
    }

    #[tokio::test]
    async fn test_trade_update_untracks_and_releases_subscription() {
        let id = Uuid::new_v4();
        let closed = ScriptStep::Frame(format!(
            r#"{{"type":"trade_update","data":{{"trade_id":"{}","status":"closed"}}}}"#,
            id
        ));
        let connector = Arc::new(MemoryConnector::new().accept(vec![closed]));
        let mut monitor = TradeMonitor::new(feed(), connector);
        monitor
            .track_with_id(id, PositionConfig::long("BTCUSDT", 100.0, 1.0))
            .unwrap();

        assert!(matches!(
            next(&mut monitor).await,
            MonitorUpdate::Connection { .. }
        ));
        match next(&mut monitor).await {
            MonitorUpdate::Untracked { id: untracked, state } => {
                assert_eq!(untracked, id);
                assert_eq!(state.symbol(), "BTCUSDT");
            }
            other => panic!("unexpected update: {:?}", other),
        }

        assert!(monitor.book().is_empty());
        assert_eq!(monitor.subscription_count(), 0);
        assert!(monitor.next_update().await.is_none());
    }

    #[tokio::test]
    async fn test_untrack_keeps_shared_subscription() {
        let connector = Arc::new(MemoryConnector::replaying(vec![]));
        let mut monitor = TradeMonitor::new(feed(), connector);
        let a = monitor.track(PositionConfig::long("BTCUSDT", 100.0, 1.0)).unwrap();
        let b = monitor.track(PositionConfig::long("BTCUSDT", 101.0, 1.0)).unwrap();

        monitor.untrack(a).unwrap();
        assert_eq!(monitor.subscription_count(), 1);

        monitor.untrack(b).unwrap();
        assert_eq!(monitor.subscription_count(), 0);
        assert!(monitor.connection_status("BTCUSDT").is_none());
        assert!(monitor.untrack(b).is_none());
    }

    #[tokio::test]
    async fn test_finishes_when_feed_gives_up() {
        let mut feed = feed();
        feed.max_reconnect_attempts = 1;
        let connector = Arc::new(MemoryConnector::new());
        let mut monitor = TradeMonitor::new(feed, connector.clone());
        monitor.track(PositionConfig::long("BTCUSDT", 100.0, 1.0)).unwrap();

        let mut statuses = Vec::new();
        while let Some(update) = tokio::time::timeout(Duration::from_secs(5), monitor.next_update())
            .await
            .expect("Test timed out")
        {
            if let MonitorUpdate::Connection { status, .. } = update {
                statuses.push(status);
            }
        }

        assert_eq!(
            statuses,
            vec![
                ConnectionStatus::Errored,
                ConnectionStatus::Closed,
                ConnectionStatus::Errored,
                ConnectionStatus::Closed,
            ]
        );
        assert_eq!(connector.connect_count(), 2);
        assert_eq!(
            monitor.connection_status("BTCUSDT"),
            Some(ConnectionStatus::Closed)
        );
    }

    #[tokio::test]
    async fn test_idle_monitor_returns_none() {
        let mut monitor = TradeMonitor::new(feed(), Arc::new(MemoryConnector::new()));
        assert!(monitor.next_update().await.is_none());
    }

    #[tokio::test]
    async fn test_retracking_id_on_other_symbol_releases_old_feed() {
        let connector = Arc::new(MemoryConnector::replaying(vec![]));
        let mut monitor = TradeMonitor::new(feed(), connector);
        let id = Uuid::new_v4();

        monitor
            .track_with_id(id, PositionConfig::long("BTCUSDT", 100.0, 1.0))
            .unwrap();
        monitor
            .track_with_id(id, PositionConfig::long("ETHUSDT", 50.0, 1.0))
            .unwrap();

        assert_eq!(monitor.book().len(), 1);
        assert_eq!(monitor.subscription_count(), 1);
        assert!(monitor.connection_status("BTCUSDT").is_none());
        assert!(monitor.connection_status("ETHUSDT").is_some());
    }

    #[tokio::test]
    async fn test_retracking_id_on_same_symbol_keeps_feed() {
        let connector = Arc::new(MemoryConnector::replaying(vec![]));
        let mut monitor = TradeMonitor::new(feed(), connector.clone());
        let id = Uuid::new_v4();

        monitor
            .track_with_id(id, PositionConfig::long("BTCUSDT", 100.0, 1.0))
            .unwrap();
        monitor
            .track_with_id(id, PositionConfig::short("BTCUSDT", 100.0, 2.0))
            .unwrap();

        assert_eq!(monitor.subscription_count(), 1);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(connector.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_events_from_released_subscription_are_dropped() {
        let connector = Arc::new(
            MemoryConnector::new()
                .accept(vec![price("BTCUSDT", 200.0)])
                .accept(vec![]),
        );
        let mut monitor = TradeMonitor::new(feed(), connector);
        let first = monitor.track(PositionConfig::long("BTCUSDT", 100.0, 1.0)).unwrap();

        // Let the first feed queue its open and tick before it is released
        tokio::time::sleep(Duration::from_millis(50)).await;
        monitor.untrack(first).unwrap();
        let second = monitor.track(PositionConfig::long("BTCUSDT", 100.0, 1.0)).unwrap();

        assert_eq!(
            next(&mut monitor).await,
            MonitorUpdate::Connection {
                symbol: "BTCUSDT".into(),
                status: ConnectionStatus::Open
            }
        );
        let more = tokio::time::timeout(Duration::from_millis(100), monitor.next_update()).await;
        assert!(more.is_err(), "unexpected update: {:?}", more);
        assert_eq!(monitor.book().get(second).unwrap().current_price(), 100.0);
    }
}
