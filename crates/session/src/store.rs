//! Authenticated session: credential, identity, friends, challenges
//!
//! The credential is the only durable piece (key `token`). Every change to it
//! is published on a watch channel so the realtime connection can follow the
//! login state.

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use syncrift_core::storage::TOKEN_KEY;
use syncrift_core::{
    BattleCategory, Challenge, ChallengeCreateRequest, CodeforcesOptions, Credential, LoginRequest, Navigator,
    Profile, Result, SharedStore, SignupForm, Stage, StatusUpdate, SyncriftError,
};

use crate::api::ApiClient;

#[derive(Debug, Default, Clone)]
struct Identity {
    username: Option<String>,
    friends: Vec<Profile>,
    pending: Vec<Profile>,
}

pub struct SessionStore {
    api: ApiClient,
    storage: SharedStore,
    navigator: Navigator,
    credential: watch::Sender<Option<Credential>>,
    identity: RwLock<Identity>,
}

impl SessionStore {
    /// Starts unauthenticated; call [`restore`](Self::restore) to pick up a
    /// persisted credential.
    pub fn new(api: ApiClient, storage: SharedStore, navigator: Navigator) -> Self {
        let (credential, _) = watch::channel(None);
        Self {
            api,
            storage,
            navigator,
            credential,
            identity: RwLock::new(Identity::default()),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn credential(&self) -> Option<Credential> {
        self.credential.borrow().clone()
    }

    pub fn watch_credential(&self) -> watch::Receiver<Option<Credential>> {
        self.credential.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.borrow().is_some()
    }

    pub fn username(&self) -> Option<String> {
        self.identity.read().username.clone()
    }

    pub fn friends(&self) -> Vec<Profile> {
        self.identity.read().friends.clone()
    }

    pub fn pending_requests(&self) -> Vec<Profile> {
        self.identity.read().pending.clone()
    }

    fn require_credential(&self) -> Result<Credential> {
        self.credential().ok_or(SyncriftError::Unauthenticated)
    }

    fn establish(&self, token: String, username: String) -> Result<()> {
        self.storage.set(TOKEN_KEY, &token)?;
        self.identity.write().username = Some(username);
        self.credential.send_replace(Some(Credential::new(token)));
        Ok(())
    }

    // ========================================================================
    // AUTH
    // ========================================================================

    /// Verify a persisted credential with the backend.
    ///
    /// Returns the username on success. A missing credential yields `None`;
    /// a rejected or unverifiable one logs out.
    pub async fn restore(&self) -> Option<String> {
        let token = self.storage.get(TOKEN_KEY)?;
        let credential = Credential::new(token);

        match self.api.me(&credential).await {
            Ok(user) => {
                info!("Restored session for {}", user.username);
                self.identity.write().username = Some(user.username.clone());
                self.credential.send_replace(Some(credential));
                Some(user.username)
            }
            Err(e) => {
                warn!("Token verification failed: {}", e);
                self.logout();
                None
            }
        }
    }

    pub async fn login(&self, identifier: &str, password: &str) -> Result<String> {
        let request = LoginRequest {
            login_identifier: identifier.to_string(),
            password: password.to_string(),
        };
        let response = self.api.login(&request).await?;
        let token = response.token.ok_or_else(|| {
            SyncriftError::Protocol("login response carried no token".to_string())
        })?;

        self.establish(token, response.username.clone())?;
        info!("Logged in as {}", response.username);
        Ok(response.username)
    }

    /// Register an account. Returns whether the session is now authenticated,
    /// which happens when the backend hands back a token.
    pub async fn signup(&self, form: &SignupForm) -> Result<bool> {
        let response = self.api.register(form).await?;
        info!("Registered {}", response.username);

        match response.token {
            Some(token) => {
                self.establish(token, response.username)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Clear credential and identity, then go to landing. Never fails.
    pub fn logout(&self) {
        if let Err(e) = self.storage.remove(TOKEN_KEY) {
            warn!("Failed to clear stored credential: {}", e);
        }
        *self.identity.write() = Identity::default();
        self.credential.send_replace(None);
        self.navigator.navigate(Stage::Landing);
        info!("Logged out");
    }

    // ========================================================================
    // FRIENDS
    // ========================================================================

    pub async fn fetch_friends(&self) -> Result<Vec<Profile>> {
        let credential = self.require_credential()?;
        let friends = self.api.friends(&credential).await?;
        debug!(count = friends.len(), "Fetched friends");
        self.identity.write().friends = friends.clone();
        Ok(friends)
    }

    pub async fn fetch_pending_requests(&self) -> Result<Vec<Profile>> {
        let credential = self.require_credential()?;
        let pending = self.api.pending_requests(&credential).await?;
        debug!(count = pending.len(), "Fetched pending friend requests");
        self.identity.write().pending = pending.clone();
        Ok(pending)
    }

    pub async fn send_friend_request(&self, username: &str) -> Result<()> {
        let credential = self.require_credential()?;
        self.api.send_friend_request(&credential, username).await?;
        info!("Friend request sent to {}", username);
        Ok(())
    }

    pub async fn accept_friend_request(&self, username: &str) -> Result<()> {
        let credential = self.require_credential()?;
        self.api.accept_friend_request(&credential, username).await?;
        info!("Accepted friend request from {}", username);
        self.fetch_friends().await?;
        self.fetch_pending_requests().await?;
        Ok(())
    }

    pub async fn decline_friend_request(&self, username: &str) -> Result<()> {
        let credential = self.require_credential()?;
        self.api.decline_friend_request(&credential, username).await?;
        info!("Declined friend request from {}", username);
        self.fetch_pending_requests().await?;
        Ok(())
    }

    pub async fn remove_friend(&self, username: &str) -> Result<()> {
        let credential = self.require_credential()?;
        self.api.remove_friend(&credential, username).await?;
        info!("Removed friend {}", username);
        self.fetch_friends().await?;
        Ok(())
    }

    /// Patch a friend's presence from the status topic.
    /// Returns false when the user is not in the friends list.
    pub fn apply_status_update(&self, update: &StatusUpdate) -> bool {
        let mut identity = self.identity.write();
        match identity
            .friends
            .iter_mut()
            .find(|f| f.username == update.username)
        {
            Some(friend) => {
                debug!(username = %update.username, status = ?update.status, "Friend status changed");
                friend.status = Some(update.status);
                true
            }
            None => false,
        }
    }

    // ========================================================================
    // CHALLENGES
    // ========================================================================

    pub async fn create_challenge(&self, username: &str, category: BattleCategory) -> Result<Challenge> {
        self.send_challenge(username, category, None).await
    }

    /// Codeforces challenge with an explicit problem set. An inverted rating
    /// range is refused before anything is sent.
    pub async fn create_codeforces_challenge(
        &self,
        username: &str,
        options: CodeforcesOptions,
    ) -> Result<Challenge> {
        options.validate()?;
        self.send_challenge(username, BattleCategory::Codeforces, Some(options))
            .await
    }

    async fn send_challenge(
        &self,
        username: &str,
        category: BattleCategory,
        codeforces: Option<CodeforcesOptions>,
    ) -> Result<Challenge> {
        let credential = self.require_credential()?;
        let request = ChallengeCreateRequest {
            username: username.to_string(),
            event_type: category,
            codeforces,
        };
        let challenge = self.api.create_challenge(&credential, &request).await?;
        info!(
            challenge_id = challenge.challenge_id,
            "Challenged {} to {}", username, category.code()
        );
        Ok(challenge)
    }

    pub async fn accept_challenge(&self, challenge_id: i64) -> Result<()> {
        let credential = self.require_credential()?;
        self.api.accept_challenge(&credential, challenge_id).await?;
        info!(challenge_id, "Challenge accepted");
        Ok(())
    }

    pub async fn decline_challenge(&self, challenge_id: i64) -> Result<()> {
        let credential = self.require_credential()?;
        self.api.decline_challenge(&credential, challenge_id).await?;
        info!(challenge_id, "Challenge declined");
        Ok(())
    }

    pub async fn pending_challenges(&self) -> Result<Vec<Challenge>> {
        let credential = self.require_credential()?;
        self.api.pending_challenges(&credential).await
    }

    pub async fn sent_challenges(&self) -> Result<Vec<Challenge>> {
        let credential = self.require_credential()?;
        self.api.sent_challenges(&credential).await
    }
}
