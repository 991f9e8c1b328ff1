//! End-to-end tests for the Syncrift client
//!
//! A small axum backend stands in for the REST API and the in-process
//! broker for the STOMP endpoint; the whole client runs through `App`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use syncrift::{App, ClientConfig, Connector, Credential, FileStore, SharedStore, Stage};
use syncrift_core::storage::{BATTLE_MARKER_KEY, TOKEN_KEY};
use syncrift_core::{topics, StateStore, UserStatus};
use syncrift_realtime::{Link, TestBroker};
use tempfile::tempdir;

const TOKEN: &str = "tok-alice";

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", TOKEN))
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["loginIdentifier"] == "alice" && body["password"] == "secret" {
        Json(json!({"token": TOKEN, "userId": 1, "username": "alice"})).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"status": 401, "message": "Invalid username or password"})),
        )
            .into_response()
    }
}

async fn me(headers: HeaderMap) -> Response {
    if authorized(&headers) {
        Json(json!({"id": 1, "username": "alice"})).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({"message": "Invalid or expired token"}))).into_response()
    }
}

async fn friends() -> Json<Value> {
    Json(json!([{"id": 2, "username": "bob", "status": "OFFLINE"}]))
}

async fn spawn_backend() -> String {
    let app = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
        .route("/api/friends", get(friends));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

struct Harness {
    app: Arc<App>,
    broker: TestBroker,
    storage: SharedStore,
    _dir: tempfile::TempDir,
}

/// Delays the handshake before handing over to the in-process broker
struct SlowConnector {
    inner: Arc<dyn Connector>,
    delay: Duration,
}

#[async_trait]
impl Connector for SlowConnector {
    async fn connect(&self, credential: &Credential) -> syncrift::Result<Link> {
        tokio::time::sleep(self.delay).await;
        self.inner.connect(credential).await
    }
}

async fn harness() -> Harness {
    harness_with(|broker| broker.connector()).await
}

async fn harness_with(connector: impl FnOnce(&TestBroker) -> Arc<dyn Connector>) -> Harness {
    let dir = tempdir().unwrap();
    let config = ClientConfig {
        api_url: spawn_backend().await,
        data_dir: dir.path().to_path_buf(),
        reconnect_delay: Duration::from_millis(50),
        ..ClientConfig::default()
    };
    let storage: SharedStore = Arc::new(FileStore::open(config.state_path()).unwrap());
    let broker = TestBroker::new();
    let app = Arc::new(App::new(config, Arc::clone(&storage), connector(&broker)).unwrap());
    app.spawn_credential_watch();

    Harness {
        app,
        broker,
        storage,
        _dir: dir,
    }
}

async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}

#[tokio::test]
async fn test_login_connects_and_routes_notifications() {
    let h = harness().await;
    assert!(h.app.channel().is_none());

    h.app.session().login("alice", "secret").await.unwrap();
    eventually("connection", || h.app.channel().is_some_and(|c| c.is_connected())).await;
    assert_eq!(h.broker.last_credential().as_deref(), Some(TOKEN));
    eventually("subscriptions", || h.broker.active_destinations().len() == 6).await;

    // every topic subscribed exactly once
    for topic in [topics::NOTIFICATIONS, topics::CHALLENGE, topics::USER_STATUS] {
        assert_eq!(h.broker.subscribe_count(topic), 1, "{}", topic);
    }

    let reached = h.broker.deliver(
        topics::NOTIFICATIONS,
        &json!({"id": 11, "senderUsername": "bob", "type": "friend_request"}).to_string(),
    );
    assert_eq!(reached, 1);
    h.broker.deliver(
        topics::CHALLENGE,
        &json!({"challengeId": 42, "senderUsername": "bob", "eventType": "TB"}).to_string(),
    );
    eventually("inbox", || h.app.inbox().len() == 2).await;
    assert!(h.app.inbox().get("challenge-42").is_some());
}

#[tokio::test]
async fn test_status_updates_reach_friend_list() {
    let h = harness().await;
    h.app.session().login("alice", "secret").await.unwrap();
    h.app.session().fetch_friends().await.unwrap();
    eventually("subscriptions", || h.broker.active_destinations().len() == 6).await;

    h.broker.deliver(
        topics::USER_STATUS,
        &json!({"userId": 2, "username": "bob", "status": "ONLINE"}).to_string(),
    );
    eventually("status", || {
        h.app.session().friends()[0].status == Some(UserStatus::Online)
    })
    .await;
}

#[tokio::test]
async fn test_battle_flow_and_refresh_guard() {
    let h = harness().await;
    let mut stages = h.app.navigator().subscribe();
    h.app.session().login("alice", "secret").await.unwrap();
    eventually("subscriptions", || h.broker.active_destinations().len() == 6).await;

    h.broker.deliver(
        topics::BATTLE_CREATE,
        &json!({"battleId": 9, "category": "TB", "opponent": {"username": "bob"}}).to_string(),
    );
    eventually("waiting room", || h.app.navigator().current() == Stage::WaitingRoom).await;

    let coordinator = h.app.coordinator().unwrap();
    assert_eq!(coordinator.ready(), Some(9));
    assert_eq!(h.broker.published(topics::APP_BATTLE_READY), vec!["9".to_string()]);

    h.broker.deliver(
        topics::BATTLE_START,
        &json!({"battleId": 9, "config": {"text": "the quick brown fox", "duration": 60}}).to_string(),
    );
    eventually("battle", || h.app.navigator().current() == Stage::Battle).await;
    coordinator.submit("the quick brown fox");

    h.broker.deliver(
        topics::BATTLE_END,
        &json!({"battleId": 9, "result": {"winnerUsername": "alice", "loserUsername": "bob"}}).to_string(),
    );
    eventually("results", || h.app.navigator().current() == Stage::Results).await;
    assert!(stages.has_changed().unwrap());

    let marker: Value = serde_json::from_str(&h.storage.get(BATTLE_MARKER_KEY).unwrap()).unwrap();
    assert_eq!(marker, json!({"battleId": 9, "stage": "results"}));

    // a refresh of the battle page after the fact lands on the home page
    assert!(!h.app.battle().revisit(Stage::Battle));
    assert_eq!(h.app.navigator().current(), Stage::Landing);
}

#[tokio::test]
async fn test_logout_shuts_down_without_reconnect() {
    let h = harness().await;
    h.app.session().login("alice", "secret").await.unwrap();
    eventually("connection", || h.app.channel().is_some_and(|c| c.is_connected())).await;
    let channel = h.app.channel().unwrap();

    h.app.session().logout();
    eventually("teardown", || h.app.channel().is_none()).await;
    assert!(!channel.is_connected());
    assert!(h.storage.get(TOKEN_KEY).is_none());

    let attempts = h.broker.connect_attempts();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(h.broker.connect_attempts(), attempts);
}

#[tokio::test]
async fn test_logout_during_handshake_tears_down_at_once() {
    let h = harness_with(|broker| {
        Arc::new(SlowConnector {
            inner: broker.connector(),
            delay: Duration::from_millis(600),
        })
    })
    .await;

    h.app.session().login("alice", "secret").await.unwrap();
    eventually("channel", || h.app.channel().is_some()).await;
    let channel = h.app.channel().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    h.app.session().logout();
    eventually("teardown", || h.app.channel().is_none()).await;
    assert_eq!(channel.state(), syncrift::ConnectionState::Disconnected);

    // the abandoned handshake never reaches the broker
    tokio::time::sleep(Duration::from_millis(900)).await;
    assert_eq!(h.broker.connect_attempts(), 0);
    assert_eq!(h.broker.session_count(), 0);
    assert!(!channel.is_connected());
}

#[tokio::test]
async fn test_broker_drop_reconnects_and_replays() {
    let h = harness().await;
    h.app.session().login("alice", "secret").await.unwrap();
    eventually("subscriptions", || h.broker.active_destinations().len() == 6).await;

    h.broker.drop_connection();
    eventually("second session", || h.broker.session_count() == 2).await;
    eventually("replay", || h.broker.active_destinations().len() == 6).await;
    assert_eq!(h.broker.subscribe_count(topics::NOTIFICATIONS), 1);
}

#[tokio::test]
async fn test_restore_uses_persisted_token() {
    let h = harness().await;
    h.storage.set(TOKEN_KEY, TOKEN).unwrap();

    assert_eq!(h.app.session().restore().await.as_deref(), Some("alice"));
    eventually("connection", || h.app.channel().is_some_and(|c| c.is_connected())).await;
}

#[tokio::test]
async fn test_restore_with_stale_token_stays_offline() {
    let h = harness().await;
    h.storage.set(TOKEN_KEY, "expired").unwrap();

    assert_eq!(h.app.session().restore().await, None);
    assert!(h.storage.get(TOKEN_KEY).is_none());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.broker.connect_attempts(), 0);
    assert!(h.app.channel().is_none());
}
