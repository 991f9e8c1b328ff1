//! Syncrift client
//!
//! Application container for the headless client. It owns the stores, and
//! the broker connection follows the login state:
//!
//! ```text
//!  SessionStore ──credential──► App ──► ChannelManager ──► broker
//!       ▲                        │             │
//!       │                        │     notifications / challenge / status
//!   REST backend                 │     battle create / start / end
//!                                ▼             ▼
//!                      NotificationInbox   BattleSessionStore ──► StageGuard ──► Navigator
//! ```
//!
//! A credential appearing builds a fresh channel manager, registers every
//! subscription and connects. The credential going away shuts the manager
//! down, cancelling any pending reconnect.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub use syncrift_battle::{BattleCoordinator, BattleSession, BattleSessionStore, StageGuard};
pub use syncrift_core::{ClientConfig, Credential, FileStore, Navigator, Result, SharedStore, Stage, SyncriftError};
pub use syncrift_realtime::{ChannelManager, ConnectionState, Connector, WsConnector};
pub use syncrift_session::{ApiClient, NotificationInbox, SessionStore};

use syncrift_core::{topics, Challenge, NotificationMessage, StatusUpdate};
use syncrift_realtime::{json_handler, SubscriptionGuard};

/// Everything tied to one authenticated connection
struct LiveSession {
    credential: Credential,
    channel: ChannelManager,
    coordinator: BattleCoordinator,
    /// In-flight connect; aborted if the session ends first
    connecting: JoinHandle<()>,
    _subscriptions: Vec<SubscriptionGuard>,
}

pub struct App {
    config: ClientConfig,
    navigator: Navigator,
    session: Arc<SessionStore>,
    inbox: Arc<NotificationInbox>,
    battle: BattleSessionStore,
    connector: Arc<dyn Connector>,
    live: Mutex<Option<LiveSession>>,
}

impl App {
    pub fn new(config: ClientConfig, storage: SharedStore, connector: Arc<dyn Connector>) -> Result<Self> {
        let navigator = Navigator::new();
        let api = ApiClient::from_config(&config)?;
        let session = Arc::new(SessionStore::new(api, storage.clone(), navigator.clone()));
        let battle = BattleSessionStore::new(StageGuard::new(storage, navigator.clone()));

        Ok(Self {
            config,
            navigator,
            session,
            inbox: Arc::new(NotificationInbox::new()),
            battle,
            connector,
            live: Mutex::new(None),
        })
    }

    /// File-backed storage under the data directory and the WebSocket broker
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let storage: SharedStore = Arc::new(FileStore::open(config.state_path())?);
        let connector: Arc<dyn Connector> = Arc::new(WsConnector::from_config(&config));
        Self::new(config, storage, connector)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn inbox(&self) -> &Arc<NotificationInbox> {
        &self.inbox
    }

    pub fn battle(&self) -> &BattleSessionStore {
        &self.battle
    }

    pub fn channel(&self) -> Option<ChannelManager> {
        self.live.lock().as_ref().map(|l| l.channel.clone())
    }

    pub fn coordinator(&self) -> Option<BattleCoordinator> {
        self.live.lock().as_ref().map(|l| l.coordinator.clone())
    }

    /// Follow the session credential for as long as the app lives
    pub fn spawn_credential_watch(self: &Arc<Self>) -> JoinHandle<()> {
        let weak: Weak<App> = Arc::downgrade(self);
        let mut rx = self.session.watch_credential();
        tokio::spawn(async move {
            loop {
                let credential = rx.borrow_and_update().clone();
                let Some(app) = weak.upgrade() else {
                    return;
                };
                app.apply_credential(credential);
                drop(app);
                if rx.changed().await.is_err() {
                    return;
                }
            }
        })
    }

    /// Bring the connection in line with `credential`. The connect runs in
    /// the background so a logout during the handshake takes effect at once.
    pub fn apply_credential(&self, credential: Option<Credential>) {
        match credential {
            Some(credential) => {
                let unchanged = self
                    .live
                    .lock()
                    .as_ref()
                    .is_some_and(|l| l.credential == credential);
                if unchanged {
                    return;
                }
                self.end_session();
                self.start_session(credential);
            }
            None => self.end_session(),
        }
    }

    fn start_session(&self, credential: Credential) {
        let channel = ChannelManager::from_config(Arc::clone(&self.connector), credential.clone(), &self.config);
        let coordinator = BattleCoordinator::new(channel.clone(), self.battle.clone());

        let mut subscriptions = coordinator.attach();
        subscriptions.extend(self.social_subscriptions(&channel));
        debug!(count = subscriptions.len(), "Subscriptions registered");

        let connecting = {
            let channel = channel.clone();
            tokio::spawn(async move { channel.connect().await })
        };

        *self.live.lock() = Some(LiveSession {
            credential,
            channel,
            coordinator,
            connecting,
            _subscriptions: subscriptions,
        });
    }

    fn social_subscriptions(&self, channel: &ChannelManager) -> Vec<SubscriptionGuard> {
        let inbox = Arc::clone(&self.inbox);
        let notifications = json_handler(move |msg: NotificationMessage| {
            inbox.push_notification(msg);
        });

        let inbox = Arc::clone(&self.inbox);
        let challenges = json_handler(move |challenge: Challenge| {
            inbox.push_challenge(&challenge);
        });

        let session = Arc::clone(&self.session);
        let status = json_handler(move |update: StatusUpdate| {
            session.apply_status_update(&update);
        });

        vec![
            channel.subscribe_with_cleanup(topics::NOTIFICATIONS, notifications),
            channel.subscribe_with_cleanup(topics::CHALLENGE, challenges),
            channel.subscribe_with_cleanup(topics::USER_STATUS, status),
        ]
    }

    fn end_session(&self) {
        let Some(live) = self.live.lock().take() else {
            return;
        };
        live.channel.shutdown();
        live.connecting.abort();
        info!("Realtime session closed");
    }
}

impl Drop for App {
    fn drop(&mut self) {
        if let Some(live) = self.live.get_mut().take() {
            live.channel.shutdown();
            live.connecting.abort();
        }
    }
}
