//! Realtime channel manager
//!
//! Owns one broker connection for the whole client and remembers every
//! subscription as a descriptor, so a fresh connection (first connect or a
//! reconnect) re-subscribes all of them. Subscriptions taken before the
//! connection exists are honored once it does.
//!
//! ```text
//!   subscribe(topic, handler)
//!           │
//!           ▼
//!   ┌──────────────┐   connect / reconnect   ┌──────────────┐
//!   │ descriptors  │────────── replay ──────►│  live link   │
//!   └──────────────┘                         └──────┬───────┘
//!                                                   │ MESSAGE
//!                                        handler(&BrokerMessage)
//! ```
//!
//! All state sits behind one mutex. It is never held across an `.await` or
//! while a handler runs.

use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use syncrift_core::{ClientConfig, Credential, Result};

use crate::connector::{Connector, Link};
use crate::frame::{Command, Frame};
use crate::state::{ConnectionEvent, ConnectionState};

// ============================================================================
// MESSAGES & HANDLERS
// ============================================================================

/// A MESSAGE frame delivered to a subscription
#[derive(Debug, Clone)]
pub struct BrokerMessage {
    pub destination: String,
    pub message_id: Option<String>,
    pub body: String,
}

impl BrokerMessage {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Shared handler. Identity is the `Arc` pointer: subscribing the same
/// handler twice to one topic yields one descriptor.
pub type MessageHandler = Arc<dyn Fn(&BrokerMessage) + Send + Sync>;

pub fn handler<F>(f: F) -> MessageHandler
where
    F: Fn(&BrokerMessage) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a typed callback; bodies that fail to decode are logged and skipped.
pub fn json_handler<T, F>(f: F) -> MessageHandler
where
    T: DeserializeOwned + 'static,
    F: Fn(T) + Send + Sync + 'static,
{
    Arc::new(move |msg: &BrokerMessage| match msg.json::<T>() {
        Ok(value) => f(value),
        Err(e) => warn!(
            destination = %msg.destination,
            "Failed to parse broker message: {}", e
        ),
    })
}

fn same_handler(a: &MessageHandler, b: &MessageHandler) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct DescriptorId(u64);

impl DescriptorId {
    fn subscription_id(&self) -> String {
        format!("sub-{}", self.0)
    }

    fn parse(subscription: &str) -> Option<Self> {
        subscription
            .strip_prefix("sub-")
            .and_then(|n| n.parse().ok())
            .map(DescriptorId)
    }
}

struct Descriptor {
    id: DescriptorId,
    topic: String,
    handler: MessageHandler,
}

struct LiveLink {
    outbound: mpsc::UnboundedSender<Frame>,
    active: HashSet<DescriptorId>,
    reader: JoinHandle<()>,
}

struct Inner {
    phase: ConnectionState,
    descriptors: Vec<Descriptor>,
    next_id: u64,
    link: Option<LiveLink>,
    reconnect: Option<JoinHandle<()>>,
    /// Bumped by every connect attempt and by shutdown; callbacks carrying an
    /// older value are ignored.
    generation: u64,
    closed: bool,
}

impl Inner {
    fn apply(&mut self, event: ConnectionEvent) -> bool {
        match self.phase.on(event) {
            Some(next) => {
                if next != self.phase {
                    debug!(from = %self.phase, to = %next, ?event, "Connection state change");
                }
                self.phase = next;
                true
            }
            None => {
                warn!(state = %self.phase, ?event, "Ignoring invalid connection transition");
                false
            }
        }
    }
}

struct Shared {
    connector: Arc<dyn Connector>,
    credential: Credential,
    reconnect_delay: Duration,
    inner: Mutex<Inner>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if let Some(timer) = inner.reconnect.take() {
            timer.abort();
        }
        if let Some(link) = inner.link.take() {
            link.reader.abort();
        }
    }
}

// ============================================================================
// CHANNEL MANAGER
// ============================================================================

/// Cloneable handle to the client's single broker connection
#[derive(Clone)]
pub struct ChannelManager {
    shared: Arc<Shared>,
}

impl ChannelManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        credential: Credential,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                connector,
                credential,
                reconnect_delay,
                inner: Mutex::new(Inner {
                    phase: ConnectionState::Disconnected,
                    descriptors: Vec::new(),
                    next_id: 0,
                    link: None,
                    reconnect: None,
                    generation: 0,
                    closed: false,
                }),
            }),
        }
    }

    pub fn from_config(
        connector: Arc<dyn Connector>,
        credential: Credential,
        config: &ClientConfig,
    ) -> Self {
        Self::new(connector, credential, config.reconnect_delay)
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.inner.lock().phase
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn reconnect_pending(&self) -> bool {
        self.shared.inner.lock().reconnect.is_some()
    }

    /// Number of remembered subscription descriptors
    pub fn descriptor_count(&self) -> usize {
        self.shared.inner.lock().descriptors.len()
    }

    /// Open the broker connection.
    ///
    /// Failures are not returned: the manager logs them and arms a single
    /// reconnect after the configured delay.
    pub async fn connect(&self) {
        let generation = {
            let mut inner = self.shared.inner.lock();
            if inner.closed {
                debug!("Channel manager is shut down, not connecting");
                return;
            }
            if !inner.apply(ConnectionEvent::ConnectRequested) {
                return;
            }
            if let Some(timer) = inner.reconnect.take() {
                timer.abort();
            }
            inner.generation += 1;
            inner.generation
        };

        info!("Connecting to broker");
        match self.shared.connector.connect(&self.shared.credential).await {
            Ok(link) => self.install_link(generation, link),
            Err(e) => {
                warn!("Broker connection failed: {}", e);
                self.handle_failure(generation, ConnectionEvent::HandshakeFailed);
            }
        }
    }

    fn install_link(&self, generation: u64, link: Link) {
        let Link { outbound, inbound } = link;
        let mut inner = self.shared.inner.lock();

        if inner.closed || inner.generation != generation {
            debug!("Discarding stale broker link");
            let _ = outbound.send(Frame::disconnect());
            return;
        }
        inner.apply(ConnectionEvent::HandshakeSucceeded);

        let mut active = HashSet::new();
        for descriptor in &inner.descriptors {
            let frame = Frame::subscribe(&descriptor.id.subscription_id(), &descriptor.topic);
            if outbound.send(frame).is_ok() {
                active.insert(descriptor.id);
            }
        }
        info!(replayed = active.len(), "Connected to broker");

        let reader = self.spawn_reader(generation, inbound);
        inner.link = Some(LiveLink {
            outbound,
            active,
            reader,
        });
    }

    fn spawn_reader(&self, generation: u64, mut inbound: mpsc::UnboundedReceiver<Frame>) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            while let Some(frame) = inbound.recv().await {
                let Some(manager) = ChannelManager::upgrade(&weak) else {
                    return;
                };
                match frame.command {
                    Command::Message => manager.dispatch(generation, &frame),
                    Command::Error => {
                        warn!(
                            "Broker error: {}",
                            frame.get("message").unwrap_or(frame.body.as_str())
                        );
                        manager.handle_failure(generation, ConnectionEvent::LinkLost);
                        return;
                    }
                    Command::Receipt => debug!("Receipt {:?}", frame.get("receipt-id")),
                    other => debug!("Ignoring unexpected {} frame", other),
                }
            }

            if let Some(manager) = ChannelManager::upgrade(&weak) {
                warn!("Broker connection lost");
                manager.handle_failure(generation, ConnectionEvent::LinkLost);
            }
        })
    }

    fn upgrade(weak: &Weak<Shared>) -> Option<ChannelManager> {
        weak.upgrade().map(|shared| ChannelManager { shared })
    }

    fn dispatch(&self, generation: u64, frame: &Frame) {
        let Some(id) = frame.get("subscription").and_then(DescriptorId::parse) else {
            debug!("MESSAGE without a known subscription id");
            return;
        };

        let handler = {
            let inner = self.shared.inner.lock();
            if inner.generation != generation {
                return;
            }
            let live = inner
                .link
                .as_ref()
                .is_some_and(|link| link.active.contains(&id));
            if !live {
                debug!(subscription = %id.subscription_id(), "MESSAGE for inactive subscription");
                return;
            }
            inner
                .descriptors
                .iter()
                .find(|d| d.id == id)
                .map(|d| Arc::clone(&d.handler))
        };

        if let Some(handler) = handler {
            let message = BrokerMessage {
                destination: frame.get("destination").unwrap_or_default().to_string(),
                message_id: frame.get("message-id").map(str::to_string),
                body: frame.body.clone(),
            };
            handler(&message);
        }
    }

    fn handle_failure(&self, generation: u64, event: ConnectionEvent) {
        let mut inner = self.shared.inner.lock();
        if inner.closed || inner.generation != generation {
            return;
        }
        if let Some(link) = inner.link.take() {
            link.reader.abort();
        }
        inner.apply(event);
        self.schedule_reconnect(&mut inner);
    }

    /// Arm the reconnect timer unless one is already pending.
    fn schedule_reconnect(&self, inner: &mut Inner) {
        if inner.closed {
            return;
        }
        if inner.reconnect.is_some() {
            debug!("Reconnect already pending");
            return;
        }
        if !inner.apply(ConnectionEvent::ReconnectScheduled) {
            return;
        }

        let delay = self.shared.reconnect_delay;
        info!("Attempting reconnect in {:?}", delay);

        let weak = Arc::downgrade(&self.shared);
        inner.reconnect = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(manager) = ChannelManager::upgrade(&weak) else {
                return;
            };
            {
                let mut inner = manager.shared.inner.lock();
                if inner.closed {
                    return;
                }
                inner.reconnect = None;
            }
            manager.connect().await;
        }));
    }

    // ========================================================================
    // SUBSCRIPTIONS
    // ========================================================================

    /// Remember `(topic, handler)` and subscribe now if connected.
    ///
    /// Returns a live handle only when the broker subscription exists.
    pub fn subscribe(&self, topic: &str, handler: MessageHandler) -> Option<SubscriptionHandle> {
        self.register(topic, handler).1
    }

    /// Like [`subscribe`](Self::subscribe), returning a guard that removes the
    /// descriptor and any live subscription when cancelled or dropped.
    pub fn subscribe_with_cleanup(&self, topic: &str, handler: MessageHandler) -> SubscriptionGuard {
        let (id, _) = self.register(topic, handler);
        SubscriptionGuard {
            shared: Arc::downgrade(&self.shared),
            id,
            topic: topic.to_string(),
            released: false,
        }
    }

    fn register(&self, topic: &str, handler: MessageHandler) -> (DescriptorId, Option<SubscriptionHandle>) {
        let mut inner = self.shared.inner.lock();

        let existing = inner
            .descriptors
            .iter()
            .find(|d| d.topic == topic && same_handler(&d.handler, &handler))
            .map(|d| d.id);
        let id = match existing {
            Some(id) => id,
            None => {
                let id = DescriptorId(inner.next_id);
                inner.next_id += 1;
                inner.descriptors.push(Descriptor {
                    id,
                    topic: topic.to_string(),
                    handler,
                });
                debug!(topic, "Subscription descriptor recorded");
                id
            }
        };

        if !inner.phase.is_connected() {
            return (id, None);
        }
        let generation = inner.generation;
        let Some(link) = inner.link.as_mut() else {
            return (id, None);
        };

        if !link.active.contains(&id) {
            if link
                .outbound
                .send(Frame::subscribe(&id.subscription_id(), topic))
                .is_err()
            {
                warn!(topic, "Broker link closed, subscription deferred");
                return (id, None);
            }
            link.active.insert(id);
            info!("Subscribed to {}", topic);
        }

        let handle = SubscriptionHandle {
            shared: Arc::downgrade(&self.shared),
            id,
            generation,
            topic: topic.to_string(),
        };
        (id, Some(handle))
    }

    fn remove_descriptor(&self, id: DescriptorId, topic: &str) {
        let mut inner = self.shared.inner.lock();
        inner.descriptors.retain(|d| d.id != id);
        if let Some(link) = inner.link.as_mut() {
            if link.active.remove(&id) {
                let _ = link.outbound.send(Frame::unsubscribe(&id.subscription_id()));
                info!("Unsubscribed from {}", topic);
            }
        }
    }

    // ========================================================================
    // PUBLISH & LIFECYCLE
    // ========================================================================

    /// Send `payload` as JSON to `topic`. A no-op with a warning unless connected.
    pub fn publish<T: Serialize + ?Sized>(&self, topic: &str, payload: &T) {
        let inner = self.shared.inner.lock();
        let link = match (&inner.phase, &inner.link) {
            (ConnectionState::Connected, Some(link)) => link,
            _ => {
                warn!(topic, "Cannot send message. Broker not connected.");
                return;
            }
        };

        let body = match serde_json::to_string(payload) {
            Ok(body) => body,
            Err(e) => {
                warn!(topic, "Failed to serialize message: {}", e);
                return;
            }
        };

        if link.outbound.send(Frame::send(topic, body)).is_err() {
            warn!(topic, "Broker link closed, message dropped");
        }
    }

    /// Tear the connection down for good: cancels the reconnect timer and
    /// the reader, and sends DISCONNECT if a link is up. Connect attempts
    /// still in flight are discarded when they finish.
    pub fn shutdown(&self) {
        let mut inner = self.shared.inner.lock();
        if inner.closed {
            return;
        }
        inner.closed = true;
        inner.generation += 1;

        if let Some(timer) = inner.reconnect.take() {
            timer.abort();
        }
        if let Some(link) = inner.link.take() {
            let _ = link.outbound.send(Frame::disconnect());
            link.reader.abort();
        }
        inner.apply(ConnectionEvent::Shutdown);
        info!("Disconnected from broker");
    }
}

// ============================================================================
// HANDLES
// ============================================================================

/// A live broker subscription
pub struct SubscriptionHandle {
    shared: Weak<Shared>,
    id: DescriptorId,
    generation: u64,
    topic: String,
}

impl SubscriptionHandle {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Remove the live subscription. The descriptor stays, so the next
    /// connection subscribes again.
    pub fn unsubscribe(self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let mut inner = shared.inner.lock();
        if inner.generation != self.generation {
            return;
        }
        if let Some(link) = inner.link.as_mut() {
            if link.active.remove(&self.id) {
                let _ = link.outbound.send(Frame::unsubscribe(&self.id.subscription_id()));
                info!("Unsubscribed from {}", self.topic);
            }
        }
    }
}

/// Teardown for [`ChannelManager::subscribe_with_cleanup`]. Runs on drop.
#[must_use = "dropping the guard unsubscribes immediately"]
pub struct SubscriptionGuard {
    shared: Weak<Shared>,
    id: DescriptorId,
    topic: String,
    released: bool,
}

impl SubscriptionGuard {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if std::mem::replace(&mut self.released, true) {
            return;
        }
        if let Some(manager) = ChannelManager::upgrade(&self.shared) {
            manager.remove_descriptor(self.id, &self.topic);
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.release();
    }
}
