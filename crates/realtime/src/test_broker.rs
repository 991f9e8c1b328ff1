//! In-process broker for tests
//!
//! Stands in for the STOMP endpoint so the channel manager and the crates on
//! top of it can be exercised without a network.
//!
//! ```ignore
//! let broker = TestBroker::new();
//! let manager = ChannelManager::new(broker.connector(), credential, delay);
//! manager.connect().await;
//! broker.deliver("/user/topic/notifications", r#"{"id":1}"#);
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use syncrift_core::{Credential, Result, SyncriftError};

use crate::connector::{Connector, Link};
use crate::frame::{Command, Frame};

/// Broker side of one accepted connection
struct BrokerSession {
    to_client: Option<mpsc::UnboundedSender<Frame>>,
    from_client: mpsc::UnboundedReceiver<Frame>,
    received: Vec<Frame>,
    /// subscription id -> destination
    active: BTreeMap<String, String>,
    next_message_id: u64,
}

impl BrokerSession {
    fn pump(&mut self) {
        while let Ok(frame) = self.from_client.try_recv() {
            match frame.command {
                Command::Subscribe => {
                    if let (Some(id), Some(dest)) = (frame.get("id"), frame.get("destination")) {
                        self.active.insert(id.to_string(), dest.to_string());
                    }
                }
                Command::Unsubscribe => {
                    if let Some(id) = frame.get("id") {
                        self.active.remove(id);
                    }
                }
                _ => {}
            }
            self.received.push(frame);
        }
    }
}

#[derive(Default)]
struct BrokerState {
    fail_remaining: usize,
    attempts: usize,
    credentials: Vec<String>,
    sessions: Vec<BrokerSession>,
}

/// Shared handle to the in-process broker
#[derive(Clone, Default)]
pub struct TestBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl TestBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(TestConnector {
            broker: self.clone(),
        })
    }

    /// Reject the next `n` connect attempts
    pub fn fail_next(&self, n: usize) {
        self.state.lock().fail_remaining = n;
    }

    pub fn connect_attempts(&self) -> usize {
        self.state.lock().attempts
    }

    /// Number of accepted connections
    pub fn session_count(&self) -> usize {
        self.state.lock().sessions.len()
    }

    pub fn last_credential(&self) -> Option<String> {
        self.state.lock().credentials.last().cloned()
    }

    /// Frames the client sent on the latest connection
    pub fn received(&self) -> Vec<Frame> {
        let mut state = self.state.lock();
        match state.sessions.last_mut() {
            Some(session) => {
                session.pump();
                session.received.clone()
            }
            None => Vec::new(),
        }
    }

    /// How many SUBSCRIBE frames for `destination` arrived on the latest connection
    pub fn subscribe_count(&self, destination: &str) -> usize {
        self.received()
            .iter()
            .filter(|f| f.command == Command::Subscribe && f.get("destination") == Some(destination))
            .count()
    }

    /// Destinations with an active subscription on the latest connection
    pub fn active_destinations(&self) -> Vec<String> {
        let mut state = self.state.lock();
        match state.sessions.last_mut() {
            Some(session) => {
                session.pump();
                session.active.values().cloned().collect()
            }
            None => Vec::new(),
        }
    }

    /// Bodies of SEND frames for `destination` on the latest connection
    pub fn published(&self, destination: &str) -> Vec<String> {
        self.received()
            .into_iter()
            .filter(|f| f.command == Command::Send && f.get("destination") == Some(destination))
            .map(|f| f.body)
            .collect()
    }

    /// Deliver a MESSAGE to every active subscription on `destination`.
    /// Returns the number of subscriptions it reached.
    pub fn deliver(&self, destination: &str, body: &str) -> usize {
        let mut state = self.state.lock();
        let Some(session) = state.sessions.last_mut() else {
            return 0;
        };
        session.pump();
        let Some(tx) = session.to_client.clone() else {
            return 0;
        };

        let targets: Vec<String> = session
            .active
            .iter()
            .filter(|(_, dest)| dest.as_str() == destination)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &targets {
            session.next_message_id += 1;
            let frame = Frame::new(Command::Message)
                .header("destination", destination)
                .header("subscription", id.as_str())
                .header("message-id", session.next_message_id.to_string())
                .header("content-type", "application/json")
                .with_body(body);
            let _ = tx.send(frame);
        }
        targets.len()
    }

    /// Push an arbitrary frame to the client
    pub fn push(&self, frame: Frame) {
        let state = self.state.lock();
        if let Some(tx) = state.sessions.last().and_then(|s| s.to_client.as_ref()) {
            let _ = tx.send(frame);
        }
    }

    /// Close the latest connection from the broker side
    pub fn drop_connection(&self) {
        let mut state = self.state.lock();
        if let Some(session) = state.sessions.last_mut() {
            session.to_client = None;
        }
    }
}

struct TestConnector {
    broker: TestBroker,
}

#[async_trait]
impl Connector for TestConnector {
    async fn connect(&self, credential: &Credential) -> Result<Link> {
        let mut state = self.broker.state.lock();
        state.attempts += 1;
        state.credentials.push(credential.as_str().to_string());

        if state.fail_remaining > 0 {
            state.fail_remaining -= 1;
            debug!("Test broker refusing connection");
            return Err(SyncriftError::Connection("connection refused".to_string()));
        }

        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        state.sessions.push(BrokerSession {
            to_client: Some(to_client),
            from_client,
            received: Vec::new(),
            active: BTreeMap::new(),
            next_message_id: 0,
        });

        Ok(Link { outbound, inbound })
    }
}
