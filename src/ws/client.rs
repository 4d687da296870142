//! Subscription with fixed-delay reconnection

use super::handler::SubscriptionHandler;
use super::transport::{Connection, Connector, Inbound, TungsteniteConnector};
use super::types::{ConnectionStatus, SendStatus, SubscriptionOptions, WsError};
use crate::feed;
use crate::telemetry::{increment, CounterMetric};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// One logical subscription to a feed endpoint
///
/// Owns a background driver task that connects, decodes frames, invokes the
/// handler, and reconnects after unexpected closures up to
/// `max_reconnect_attempts` times. The driver runs one connection at a time.
/// Dropping the handle closes the subscription.
pub struct Subscription {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
    driver: Option<JoinHandle<()>>,
}

enum Command {
    Send(String),
    Close,
}

struct Shared {
    target: String,
    options: SubscriptionOptions,
    inner: Mutex<Inner>,
}

/// Everything the driver and the handle both touch, behind one lock
struct Inner {
    status: ConnectionStatus,
    reconnect_attempts: u32,
    exhausted: bool,
    shut_down: bool,
    handler: Box<dyn SubscriptionHandler>,
}

enum AfterClose {
    Reconnect(u32),
    GiveUp,
    ShutDown,
}

impl Subscription {
    /// Open a subscription to `target` using `connector`
    ///
    /// Must be called within a tokio runtime. The first connection attempt
    /// starts immediately; transport failures are reported to `handler`, never
    /// returned here.
    pub fn open(
        target: impl Into<String>,
        options: SubscriptionOptions,
        handler: impl SubscriptionHandler,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, WsError> {
        options.validate()?;

        let shared = Arc::new(Shared {
            target: target.into(),
            options,
            inner: Mutex::new(Inner {
                status: ConnectionStatus::Connecting,
                reconnect_attempts: 0,
                exhausted: false,
                shut_down: false,
                handler: Box::new(handler),
            }),
        });

        let (tx, rx) = mpsc::unbounded_channel();
        let driver = Driver {
            shared: Arc::clone(&shared),
            connector,
            commands: rx,
        };
        let handle = tokio::spawn(driver.run());

        Ok(Self {
            shared,
            commands: tx,
            driver: Some(handle),
        })
    }

    /// Open a WebSocket subscription
    pub fn connect(
        url: impl Into<String>,
        options: SubscriptionOptions,
        handler: impl SubscriptionHandler,
    ) -> Result<Self, WsError> {
        Self::open(url, options, handler, Arc::new(TungsteniteConnector))
    }

    /// Endpoint this subscription connects to
    pub fn target(&self) -> &str {
        &self.shared.target
    }

    /// Current connectivity
    pub fn status(&self) -> ConnectionStatus {
        self.shared.lock().status
    }

    /// Reconnect attempts since the last successful open
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.lock().reconnect_attempts
    }

    /// True once the reconnect bound was hit; the subscription stays closed
    pub fn is_exhausted(&self) -> bool {
        self.shared.lock().exhausted
    }

    /// Serialize `payload` as JSON and send it on the open connection
    ///
    /// Nothing is queued: when the subscription is not open the payload is
    /// dropped with a warning and [`SendStatus::NotOpen`] is returned.
    pub fn send<T: Serialize + ?Sized>(&self, payload: &T) -> Result<SendStatus, WsError> {
        let text = serde_json::to_string(payload).map_err(|e| WsError::Serialize(e.to_string()))?;

        let status = self.status();
        if status != ConnectionStatus::Open {
            tracing::warn!(url = %self.shared.target, %status, "Subscription not open, dropping outbound message");
            return Ok(SendStatus::NotOpen);
        }

        if self.commands.send(Command::Send(text)).is_err() {
            tracing::warn!(url = %self.shared.target, "Subscription driver stopped, dropping outbound message");
            return Ok(SendStatus::NotOpen);
        }
        Ok(SendStatus::Sent)
    }

    /// Close the subscription
    ///
    /// Cancels any pending reconnect and releases the transport. No handler
    /// callback runs after this returns. Idempotent.
    pub fn close(&self) {
        {
            let mut inner = self.shared.lock();
            if inner.shut_down {
                return;
            }
            inner.shut_down = true;
            inner.status = ConnectionStatus::Closed;
        }

        // The driver may already be gone after exhausting its reconnects
        let _ = self.commands.send(Command::Close);
        tracing::info!(url = %self.shared.target, "Subscription closed");
    }

    /// Wait for the driver task to stop
    ///
    /// Returns once the subscription was closed or gave up reconnecting.
    pub async fn join(&mut self) {
        if let Some(handle) = self.driver.take() {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Subscription driver panicked");
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("target", &self.shared.target)
            .field("status", &self.status())
            .finish()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, status: ConnectionStatus) -> bool {
        let mut inner = self.lock();
        if inner.shut_down {
            return false;
        }
        inner.status = status;
        true
    }

    fn opened(&self) -> bool {
        let mut inner = self.lock();
        if inner.shut_down {
            return false;
        }
        inner.status = ConnectionStatus::Open;
        inner.reconnect_attempts = 0;
        inner.handler.on_open();
        true
    }

    fn deliver(&self, text: &str) {
        let message = match feed::decode(text) {
            Ok(message) => message,
            Err(e) => {
                increment(CounterMetric::DecodeErrors);
                tracing::warn!(url = %self.target, error = %e, "Dropping undecodable frame");
                return;
            }
        };

        if !self.options.accepts(message.kind()) {
            tracing::trace!(kind = message.kind(), "Message type filtered out");
            return;
        }

        let mut inner = self.lock();
        if !inner.shut_down {
            inner.handler.on_message(message);
        }
    }

    /// Error on a live connection; status is left as is while frames may still flow
    fn errored(&self, error: &WsError) {
        tracing::warn!(url = %self.target, error = %error, "Subscription transport error");
        let mut inner = self.lock();
        if inner.shut_down {
            return;
        }
        inner.handler.on_error(error);
    }

    fn connect_failed(&self, error: &WsError) {
        tracing::warn!(url = %self.target, error = %error, "Subscription connect failed");
        let mut inner = self.lock();
        if inner.shut_down {
            return;
        }
        inner.status = ConnectionStatus::Errored;
        inner.handler.on_error(error);
    }

    fn closed_unexpectedly(&self) -> AfterClose {
        let mut inner = self.lock();
        if inner.shut_down {
            return AfterClose::ShutDown;
        }
        inner.status = ConnectionStatus::Closed;
        inner.handler.on_close();

        if inner.reconnect_attempts < self.options.max_reconnect_attempts {
            inner.reconnect_attempts += 1;
            AfterClose::Reconnect(inner.reconnect_attempts)
        } else {
            inner.exhausted = true;
            AfterClose::GiveUp
        }
    }
}

struct Driver {
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl Driver {
    async fn run(mut self) {
        loop {
            if !self.shared.set_status(ConnectionStatus::Connecting) {
                return;
            }

            let connected = tokio::select! {
                result = self.connector.connect(&self.shared.target) => result,
                _ = wait_for_close(&mut self.commands) => return,
            };

            match connected {
                Ok(mut conn) => {
                    if let Some(frame) = self.shared.options.subscribe_frame() {
                        if let Err(e) = conn.send_text(frame).await {
                            self.shared.errored(&e);
                        }
                    }
                    if !self.shared.opened() {
                        conn.close().await;
                        return;
                    }
                    tracing::info!(url = %self.shared.target, "Subscription open");

                    if self.pump(conn.as_mut()).await {
                        conn.close().await;
                        return;
                    }
                }
                Err(e) => self.shared.connect_failed(&e),
            }

            match self.shared.closed_unexpectedly() {
                AfterClose::Reconnect(attempt) => {
                    increment(CounterMetric::Reconnects);
                    let delay = self.shared.options.reconnect_delay;
                    tracing::warn!(
                        url = %self.shared.target,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Subscription closed, reconnecting..."
                    );

                    tokio::select! {
                        _ = sleep(delay) => {}
                        _ = wait_for_close(&mut self.commands) => return,
                    }
                }
                AfterClose::GiveUp => {
                    tracing::error!(url = %self.shared.target, "Max reconnection attempts reached");
                    return;
                }
                AfterClose::ShutDown => return,
            }
        }
    }

    /// Stream frames until the connection drops (false) or the owner closes (true)
    async fn pump(&mut self, conn: &mut dyn Connection) -> bool {
        loop {
            tokio::select! {
                event = conn.next_event() => match event {
                    Some(Inbound::Text(text)) => self.shared.deliver(&text),
                    Some(Inbound::Error(e)) => self.shared.errored(&e),
                    None => return false,
                },
                command = self.commands.recv() => match command {
                    Some(Command::Send(text)) => {
                        if let Err(e) = conn.send_text(text).await {
                            self.shared.errored(&e);
                        }
                    }
                    Some(Command::Close) | None => return true,
                },
            }
        }
    }
}

/// Resolves when the owner closes or drops the handle; stale sends are discarded
async fn wait_for_close(commands: &mut mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = commands.recv().await {
        match command {
            Command::Close => return,
            Command::Send(_) => tracing::debug!("Discarding send issued before disconnect"),
        }
    }
}
