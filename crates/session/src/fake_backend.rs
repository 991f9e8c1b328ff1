//! In-process stand-in for the REST backend used by this crate's tests

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::api::ApiClient;

pub(crate) const TOKEN: &str = "tok-alice";

#[derive(Default)]
pub(crate) struct Backend {
    pub friends: Mutex<Vec<Value>>,
    pub pending: Mutex<Vec<Value>>,
    pub calls: Mutex<Vec<String>>,
}

impl Backend {
    pub fn called(&self, call: &str) -> bool {
        self.calls.lock().iter().any(|c| c == call)
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }
}

type Shared = Arc<Backend>;

fn error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({"status": status.as_u16(), "error": "Error", "message": message})),
    )
        .into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", TOKEN))
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["loginIdentifier"] == "alice" && body["password"] == "secret" {
        Json(json!({"token": TOKEN, "userId": 1, "username": "alice", "roles": ["USER"]}))
            .into_response()
    } else {
        error(StatusCode::UNAUTHORIZED, "Invalid username or password")
    }
}

async fn register(Json(body): Json<Value>) -> Response {
    match body["username"].as_str() {
        Some("taken") => error(StatusCode::BAD_REQUEST, "Username is already taken"),
        Some("alice") => {
            Json(json!({"token": TOKEN, "userId": 1, "username": "alice"})).into_response()
        }
        Some(other) => Json(json!({"username": other})).into_response(),
        None => error(StatusCode::BAD_REQUEST, "Username cannot be blank"),
    }
}

async fn me(headers: HeaderMap) -> Response {
    if authorized(&headers) {
        Json(json!({"id": 1, "username": "alice", "email": "alice@example.com"})).into_response()
    } else {
        error(StatusCode::UNAUTHORIZED, "Invalid or expired token")
    }
}

async fn friends(State(backend): State<Shared>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    Json(Value::Array(backend.friends.lock().clone())).into_response()
}

async fn pending(State(backend): State<Shared>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    Json(Value::Array(backend.pending.lock().clone())).into_response()
}

async fn send_request(State(backend): State<Shared>, Json(body): Json<Value>) -> Response {
    let username = body["username"].as_str().unwrap_or_default().to_string();
    if username == "alice" {
        return error(StatusCode::BAD_REQUEST, "Cannot send friend request to yourself");
    }
    backend.record(format!("request:{}", username));
    Json(json!({"success": true, "message": "Friend request sent"})).into_response()
}

async fn accept_request(State(backend): State<Shared>, Path(user): Path<String>) -> Response {
    backend.record(format!("accept:{}", user));
    let mut pending = backend.pending.lock();
    let Some(pos) = pending.iter().position(|p| p["username"] == user.as_str()) else {
        return error(StatusCode::NOT_FOUND, "Friend request not found");
    };
    let profile = pending.remove(pos);
    backend.friends.lock().push(profile);
    Json(json!({"success": true, "message": "Friend request accepted"})).into_response()
}

async fn decline_request(State(backend): State<Shared>, Path(user): Path<String>) -> Response {
    backend.record(format!("decline:{}", user));
    backend
        .pending
        .lock()
        .retain(|p| p["username"] != user.as_str());
    Json(json!({"success": true, "message": "Friend request declined"})).into_response()
}

async fn remove_friend(State(backend): State<Shared>, Path(user): Path<String>) -> Response {
    backend.record(format!("remove:{}", user));
    backend
        .friends
        .lock()
        .retain(|p| p["username"] != user.as_str());
    Json(json!({"success": true, "message": "Friend removed"})).into_response()
}

async fn create_challenge(State(backend): State<Shared>, Json(body): Json<Value>) -> Response {
    backend.record(format!(
        "challenge:{}:{}",
        body["username"].as_str().unwrap_or_default(),
        body["eventType"].as_str().unwrap_or_default()
    ));
    if let Some(questions) = body["questions"].as_u64() {
        backend.record(format!(
            "codeforces:{}:{}-{}:{}",
            questions, body["minRating"], body["maxRating"], body["duration"]
        ));
    }
    Json(json!({
        "challengeId": 42,
        "senderUsername": "alice",
        "recipientUsername": body["username"],
        "status": "PENDING",
        "eventType": body["eventType"],
        "timeRemainingSeconds": 60
    }))
    .into_response()
}

async fn accept_challenge(State(backend): State<Shared>, Path(id): Path<i64>) -> StatusCode {
    backend.record(format!("challenge-accept:{}", id));
    StatusCode::OK
}

async fn decline_challenge(State(backend): State<Shared>, Path(id): Path<i64>) -> Response {
    backend.record(format!("challenge-decline:{}", id));
    Json(json!({"challengeId": id, "status": "DECLINED"})).into_response()
}

async fn pending_challenges(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    Json(json!([{
        "challengeId": 7,
        "senderUsername": "bob",
        "recipientUsername": "alice",
        "status": "PENDING",
        "eventType": "CSS"
    }]))
    .into_response()
}

async fn sent_challenges(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    Json(json!([])).into_response()
}

pub(crate) async fn spawn() -> (ApiClient, Shared) {
    let backend: Shared = Arc::new(Backend::default());
    let app = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/auth/me", get(me))
        .route("/api/friends", get(friends))
        .route("/api/friends/pending", get(pending))
        .route("/api/friends/request", post(send_request))
        .route("/api/friends/request/:user/accept", put(accept_request))
        .route("/api/friends/request/:user/decline", delete(decline_request))
        .route("/api/friends/:user", delete(remove_friend))
        .route("/api/challenges/create", post(create_challenge))
        .route("/api/challenges/:id/accept", post(accept_challenge))
        .route("/api/challenges/:id/decline", post(decline_challenge))
        .route("/api/challenges/pending", get(pending_challenges))
        .route("/api/challenges/sent", get(sent_challenges))
        .with_state(Arc::clone(&backend));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let api = ApiClient::new(format!("http://{}", addr), Duration::from_secs(5)).unwrap();
    (api, backend)
}
