//! In-memory transport for replaying recorded frames

use super::transport::{Connection, Connector, Inbound};
use super::WsError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// One step of a scripted connection
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    /// Deliver a text frame
    Frame(String),
    /// Report a transport error without closing
    Error(String),
    /// Close the connection from the server side
    Close,
}

/// What the next connection attempt does
#[derive(Debug, Clone, PartialEq)]
pub enum Session {
    /// Fail the attempt
    Refuse(String),
    /// Open and play the steps; stays open once they run out
    Accept(Vec<ScriptStep>),
}

/// Connector that plays scripted sessions in order
///
/// Once the queue is empty every attempt uses the fallback session, which
/// refuses by default.
#[derive(Debug)]
pub struct MemoryConnector {
    sessions: Mutex<VecDeque<Session>>,
    fallback: Session,
    connects: AtomicUsize,
    sent: Arc<Mutex<Vec<String>>>,
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConnector {
    /// Connector with no sessions; every attempt is refused
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(VecDeque::new()),
            fallback: Session::Refuse("no scripted session".into()),
            connects: AtomicUsize::new(0),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every connection plays `steps`
    pub fn replaying(steps: Vec<ScriptStep>) -> Self {
        Self {
            fallback: Session::Accept(steps),
            ..Self::new()
        }
    }

    /// Queue an accepted session
    pub fn accept(self, steps: Vec<ScriptStep>) -> Self {
        self.push(Session::Accept(steps))
    }

    /// Queue a refused attempt
    pub fn refuse(self, reason: impl Into<String>) -> Self {
        self.push(Session::Refuse(reason.into()))
    }

    fn push(self, session: Session) -> Self {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(session);
        self
    }

    /// Number of connection attempts so far
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Frames written by clients, across all connections
    pub fn sent(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, target: &str) -> Result<Box<dyn Connection>, WsError> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        let session = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match session {
            Session::Refuse(reason) => {
                tracing::debug!(url = %target, %reason, "Memory connection refused");
                Err(WsError::ConnectionFailed(reason))
            }
            Session::Accept(steps) => Ok(Box::new(MemoryConnection {
                steps: steps.into(),
                sent: Arc::clone(&self.sent),
                closed: false,
            })),
        }
    }
}

struct MemoryConnection {
    steps: VecDeque<ScriptStep>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: bool,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn next_event(&mut self) -> Option<Inbound> {
        if self.closed {
            return None;
        }
        match self.steps.pop_front() {
            Some(ScriptStep::Frame(text)) => Some(Inbound::Text(text)),
            Some(ScriptStep::Error(reason)) => Some(Inbound::Error(WsError::Transport(reason))),
            Some(ScriptStep::Close) => {
                self.closed = true;
                None
            }
            None => std::future::pending().await,
        }
    }

    async fn send_text(&mut self, text: String) -> Result<(), WsError> {
        if self.closed {
            return Err(WsError::SendFailed("connection closed".into()));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text);
        Ok(())
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}
