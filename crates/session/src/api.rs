//! REST client for the Syncrift backend
//!
//! Thin wrapper over `reqwest`: one method per endpoint, bearer auth on
//! everything except login/register, and non-success responses mapped to
//! [`SyncriftError::Api`] carrying the backend's `message`.

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use syncrift_core::{
    AuthResponse, Challenge, ChallengeCreateRequest, ClientConfig, Credential, CurrentUser,
    ErrorBody, FriendRequest, LoginRequest, Profile, Result, SignupForm, SyncriftError,
};

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncriftError::Http(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(config.api_base(), config.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str, credential: Option<&Credential>) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(method = %method, "Request {}", url);
        let req = self.client.request(method, url);
        match credential {
            Some(c) => req.bearer_auth(c.as_str()),
            None => req,
        }
    }

    // ========================================================================
    // AUTH
    // ========================================================================

    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse> {
        let req = self.request(Method::POST, "/api/auth/login", None).json(request);
        self.send_json(req).await
    }

    pub async fn register(&self, form: &SignupForm) -> Result<AuthResponse> {
        let req = self.request(Method::POST, "/api/auth/register", None).json(form);
        self.send_json(req).await
    }

    pub async fn me(&self, credential: &Credential) -> Result<CurrentUser> {
        let req = self.request(Method::GET, "/api/auth/me", Some(credential));
        self.send_json(req).await
    }

    // ========================================================================
    // FRIENDS
    // ========================================================================

    pub async fn friends(&self, credential: &Credential) -> Result<Vec<Profile>> {
        let req = self.request(Method::GET, "/api/friends", Some(credential));
        self.send_json(req).await
    }

    pub async fn pending_requests(&self, credential: &Credential) -> Result<Vec<Profile>> {
        let req = self.request(Method::GET, "/api/friends/pending", Some(credential));
        self.send_json(req).await
    }

    pub async fn send_friend_request(&self, credential: &Credential, username: &str) -> Result<()> {
        let body = FriendRequest {
            username: username.to_string(),
        };
        let req = self
            .request(Method::POST, "/api/friends/request", Some(credential))
            .json(&body);
        self.send_empty(req).await
    }

    pub async fn accept_friend_request(&self, credential: &Credential, username: &str) -> Result<()> {
        let path = format!("/api/friends/request/{}/accept", username);
        self.send_empty(self.request(Method::PUT, &path, Some(credential)))
            .await
    }

    pub async fn decline_friend_request(&self, credential: &Credential, username: &str) -> Result<()> {
        let path = format!("/api/friends/request/{}/decline", username);
        self.send_empty(self.request(Method::DELETE, &path, Some(credential)))
            .await
    }

    pub async fn remove_friend(&self, credential: &Credential, username: &str) -> Result<()> {
        let path = format!("/api/friends/{}", username);
        self.send_empty(self.request(Method::DELETE, &path, Some(credential)))
            .await
    }

    // ========================================================================
    // CHALLENGES
    // ========================================================================

    pub async fn create_challenge(
        &self,
        credential: &Credential,
        request: &ChallengeCreateRequest,
    ) -> Result<Challenge> {
        let req = self
            .request(Method::POST, "/api/challenges/create", Some(credential))
            .json(request);
        self.send_json(req).await
    }

    pub async fn accept_challenge(&self, credential: &Credential, challenge_id: i64) -> Result<()> {
        let path = format!("/api/challenges/{}/accept", challenge_id);
        self.send_empty(self.request(Method::POST, &path, Some(credential)))
            .await
    }

    pub async fn decline_challenge(&self, credential: &Credential, challenge_id: i64) -> Result<()> {
        let path = format!("/api/challenges/{}/decline", challenge_id);
        self.send_empty(self.request(Method::POST, &path, Some(credential)))
            .await
    }

    pub async fn pending_challenges(&self, credential: &Credential) -> Result<Vec<Challenge>> {
        let req = self.request(Method::GET, "/api/challenges/pending", Some(credential));
        self.send_json(req).await
    }

    pub async fn sent_challenges(&self, credential: &Credential) -> Result<Vec<Challenge>> {
        let req = self.request(Method::GET, "/api/challenges/sent", Some(credential));
        self.send_json(req).await
    }

    // ========================================================================
    // PLUMBING
    // ========================================================================

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let response = check(req.send().await?).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| SyncriftError::Serialization(format!("Invalid response body: {}", e)))
    }

    async fn send_empty(&self, req: RequestBuilder) -> Result<()> {
        check(req.send().await?).await?;
        Ok(())
    }
}

/// Map a non-success response to `Api { status, message }`
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|body| body.message.or(body.error))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            if text.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            } else {
                text
            }
        });

    Err(SyncriftError::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post, put};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn serve(app: Router) -> ApiClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        ApiClient::new(format!("http://{}/", addr), Duration::from_secs(5)).unwrap()
    }

    fn bearer(headers: &HeaderMap) -> Option<String> {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    #[tokio::test]
    async fn test_login_posts_identifier_and_password() {
        let app = Router::new().route(
            "/api/auth/login",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body, json!({"loginIdentifier": "alice", "password": "pw"}));
                Json(json!({"token": "t1", "userId": 1, "username": "alice", "roles": ["USER"]}))
            }),
        );
        let api = serve(app).await;

        let resp = api
            .login(&LoginRequest {
                login_identifier: "alice".into(),
                password: "pw".into(),
            })
            .await
            .unwrap();
        assert_eq!(resp.token.as_deref(), Some("t1"));
        assert_eq!(resp.username, "alice");
    }

    #[tokio::test]
    async fn test_error_body_message_is_surfaced() {
        let app = Router::new().route(
            "/api/auth/login",
            post(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({
                        "status": 401,
                        "error": "Unauthorized",
                        "message": "Invalid username or password",
                        "path": "/api/auth/login"
                    })),
                )
            }),
        );
        let api = serve(app).await;

        let err = api
            .login(&LoginRequest {
                login_identifier: "alice".into(),
                password: "bad".into(),
            })
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(err.to_string(), "Invalid username or password");
    }

    #[tokio::test]
    async fn test_plain_text_error_falls_back_to_body() {
        let app = Router::new().route(
            "/api/friends/request",
            post(|| async { (StatusCode::BAD_REQUEST, "Already friends") }),
        );
        let api = serve(app).await;

        let err = api
            .send_friend_request(&Credential::new("t"), "bob")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncriftError::Api { status: 400, ref message } if message == "Already friends"));
    }

    #[tokio::test]
    async fn test_authenticated_calls_carry_bearer() {
        let app = Router::new()
            .route(
                "/api/friends",
                get(|headers: HeaderMap| async move {
                    assert_eq!(bearer(&headers).as_deref(), Some("Bearer t"));
                    Json(json!([{"id": 2, "username": "bob", "status": "ONLINE"}]))
                }),
            )
            .route(
                "/api/friends/request/:user/accept",
                put(|Path(user): Path<String>, headers: HeaderMap| async move {
                    assert_eq!(user, "carol");
                    assert!(bearer(&headers).is_some());
                    Json(json!({"success": true, "message": "Friend request accepted"}))
                }),
            )
            .route(
                "/api/challenges/:id/accept",
                post(|Path(id): Path<i64>| async move {
                    assert_eq!(id, 9);
                    StatusCode::OK
                }),
            );
        let api = serve(app).await;
        let cred = Credential::new("t");

        let friends = api.friends(&cred).await.unwrap();
        assert_eq!(friends[0].username, "bob");
        api.accept_friend_request(&cred, "carol").await.unwrap();
        api.accept_challenge(&cred, 9).await.unwrap();
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let api = ApiClient::new("http://localhost:8081/", Duration::from_secs(1)).unwrap();
        assert_eq!(api.base_url(), "http://localhost:8081");
    }
}
