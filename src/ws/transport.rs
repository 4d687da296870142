//! Transport seam and the WebSocket implementation

use super::WsError;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Something read from a live connection
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// UTF-8 text frame
    Text(String),
    /// Transport-level error; the connection may still be usable
    Error(WsError),
}

/// One live transport connection
#[async_trait]
pub trait Connection: Send {
    /// Next inbound frame or error; `None` once the connection has closed
    async fn next_event(&mut self) -> Option<Inbound>;
    /// Write a text frame
    async fn send_text(&mut self, text: String) -> Result<(), WsError>;
    /// Close the connection gracefully
    async fn close(&mut self);
}

/// Opens connections to a feed endpoint
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish a connection to `target`
    async fn connect(&self, target: &str) -> Result<Box<dyn Connection>, WsError>;
}

/// WebSocket connector backed by tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, target: &str) -> Result<Box<dyn Connection>, WsError> {
        tracing::info!(url = %target, "Connecting to WebSocket");

        let (stream, _response) = connect_async(target)
            .await
            .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;

        tracing::info!(url = %target, "WebSocket connected");
        Ok(Box::new(TungsteniteConnection {
            stream,
            failed: false,
        }))
    }
}

struct TungsteniteConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    /// Set after a read error; the stream is treated as closed from then on
    failed: bool,
}

#[async_trait]
impl Connection for TungsteniteConnection {
    async fn next_event(&mut self) -> Option<Inbound> {
        if self.failed {
            return None;
        }

        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Some(Inbound::Text(text)),
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                    Ok(text) => return Some(Inbound::Text(text)),
                    Err(_) => tracing::debug!("Ignoring non UTF-8 binary frame"),
                },
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = self.stream.send(Message::Pong(data)).await {
                        return Some(Inbound::Error(WsError::SendFailed(e.to_string())));
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "Received close frame");
                    return None;
                }
                Some(Ok(_)) => {}
                Some(Err(tungstenite::Error::ConnectionClosed))
                | Some(Err(tungstenite::Error::AlreadyClosed))
                | None => return None,
                Some(Err(e)) => {
                    self.failed = true;
                    return Some(Inbound::Error(WsError::Transport(e.to_string())));
                }
            }
        }
    }

    async fn send_text(&mut self, text: String) -> Result<(), WsError> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| WsError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!(error = %e, "Error while closing WebSocket");
        }
    }
}
