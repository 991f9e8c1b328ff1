//! Notification inbox fed by the notifications and challenge topics

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use syncrift_core::{Challenge, NotificationMessage, Result};

use crate::store::SessionStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    FriendRequest,
    Challenge,
    Message,
    Other(String),
}

impl NotificationKind {
    fn from_wire(kind: Option<&str>) -> Self {
        match kind {
            Some("friend_request") => NotificationKind::FriendRequest,
            Some("challenge") => NotificationKind::Challenge,
            Some("message") | None => NotificationKind::Message,
            Some(other) => NotificationKind::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InboxEntry {
    pub id: String,
    pub kind: NotificationKind,
    pub from: Option<String>,
    pub challenge_id: Option<i64>,
    pub content: Option<String>,
    pub read: bool,
    pub received_at: DateTime<Utc>,
}

impl InboxEntry {
    /// Friend requests and challenges can be accepted or declined
    pub fn is_actionable(&self) -> bool {
        matches!(
            self.kind,
            NotificationKind::FriendRequest | NotificationKind::Challenge
        )
    }

    pub fn title(&self) -> &str {
        match &self.kind {
            NotificationKind::FriendRequest => "Friend Request",
            NotificationKind::Challenge => "New Challenge",
            NotificationKind::Message => "Message",
            NotificationKind::Other(kind) => kind,
        }
    }

    pub fn description(&self) -> String {
        let from = self.from.as_deref().unwrap_or("someone");
        match self.kind {
            NotificationKind::FriendRequest => format!("{} sent you a friend request", from),
            NotificationKind::Challenge => format!("{} challenged you to a game", from),
            _ => self.content.clone().unwrap_or_default(),
        }
    }
}

/// Deduplicated by entry id
#[derive(Default)]
pub struct NotificationInbox {
    entries: RwLock<Vec<InboxEntry>>,
    local_ids: AtomicU64,
}

impl NotificationInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when an entry with the same id is already present
    pub fn push_notification(&self, msg: NotificationMessage) -> bool {
        let id = match msg.id {
            Some(id) => id.to_string(),
            None => format!("local-{}", self.local_ids.fetch_add(1, Ordering::Relaxed)),
        };
        self.insert(InboxEntry {
            id,
            kind: NotificationKind::from_wire(msg.kind.as_deref()),
            from: msg.sender_username,
            challenge_id: msg.challenge_id,
            content: msg.message,
            read: false,
            received_at: Utc::now(),
        })
    }

    pub fn push_challenge(&self, challenge: &Challenge) -> bool {
        self.insert(InboxEntry {
            id: format!("challenge-{}", challenge.challenge_id),
            kind: NotificationKind::Challenge,
            from: challenge.sender_username.clone(),
            challenge_id: Some(challenge.challenge_id),
            content: Some("You received a new challenge!".to_string()),
            read: false,
            received_at: Utc::now(),
        })
    }

    fn insert(&self, entry: InboxEntry) -> bool {
        let mut entries = self.entries.write();
        if entries.iter().any(|e| e.id == entry.id) {
            debug!(id = %entry.id, "Duplicate notification ignored");
            return false;
        }
        debug!(id = %entry.id, kind = ?entry.kind, "Notification received");
        entries.push(entry);
        true
    }

    pub fn entries(&self) -> Vec<InboxEntry> {
        self.entries.read().clone()
    }

    pub fn get(&self, id: &str) -> Option<InboxEntry> {
        self.entries.read().iter().find(|e| e.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn unread_count(&self) -> usize {
        self.entries.read().iter().filter(|e| !e.read).count()
    }

    pub fn mark_all_read(&self) {
        for entry in self.entries.write().iter_mut() {
            entry.read = true;
        }
    }

    pub fn remove(&self, id: &str) -> Option<InboxEntry> {
        let mut entries = self.entries.write();
        let pos = entries.iter().position(|e| e.id == id)?;
        Some(entries.remove(pos))
    }

    /// Accept through the matching REST call, then drop the entry.
    /// Returns false if no entry has this id. On error the entry stays.
    pub async fn accept(&self, id: &str, session: &SessionStore) -> Result<bool> {
        self.resolve(id, session, true).await
    }

    pub async fn decline(&self, id: &str, session: &SessionStore) -> Result<bool> {
        self.resolve(id, session, false).await
    }

    async fn resolve(&self, id: &str, session: &SessionStore, accept: bool) -> Result<bool> {
        let Some(entry) = self.get(id) else {
            warn!("Notification not found: {}", id);
            return Ok(false);
        };

        match (&entry.kind, entry.challenge_id, entry.from.as_deref()) {
            (NotificationKind::Challenge, Some(challenge_id), _) => {
                if accept {
                    session.accept_challenge(challenge_id).await?;
                } else {
                    session.decline_challenge(challenge_id).await?;
                }
            }
            (NotificationKind::FriendRequest, _, Some(from)) => {
                if accept {
                    session.accept_friend_request(from).await?;
                } else {
                    session.decline_friend_request(from).await?;
                    session.fetch_friends().await?;
                }
            }
            _ => {}
        }

        self.remove(id);
        info!(id, accepted = accept, "Notification resolved");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_backend;
    use serde_json::json;
    use syncrift_core::{MemoryStore, Navigator};

    fn notification(id: Option<i64>, kind: &str, from: &str) -> NotificationMessage {
        NotificationMessage {
            id,
            sender_username: Some(from.to_string()),
            kind: Some(kind.to_string()),
            message: Some("hi".to_string()),
            challenge_id: None,
            created_at: None,
        }
    }

    fn challenge(id: i64, from: &str) -> Challenge {
        serde_json::from_value(json!({"challengeId": id, "senderUsername": from})).unwrap()
    }

    #[test]
    fn test_dedupe_by_id() {
        let inbox = NotificationInbox::new();
        assert!(inbox.push_notification(notification(Some(1), "friend_request", "bob")));
        assert!(!inbox.push_notification(notification(Some(1), "friend_request", "bob")));
        assert!(inbox.push_challenge(&challenge(1, "carol")));
        assert!(!inbox.push_challenge(&challenge(1, "carol")));

        // missing ids never collide
        assert!(inbox.push_notification(notification(None, "message", "dan")));
        assert!(inbox.push_notification(notification(None, "message", "dan")));
        assert_eq!(inbox.len(), 4);
    }

    #[test]
    fn test_read_tracking() {
        let inbox = NotificationInbox::new();
        inbox.push_notification(notification(Some(1), "message", "bob"));
        inbox.push_challenge(&challenge(5, "carol"));
        assert_eq!(inbox.unread_count(), 2);

        inbox.mark_all_read();
        assert_eq!(inbox.unread_count(), 0);
        assert_eq!(inbox.len(), 2);
    }

    #[test]
    fn test_entry_presentation() {
        let inbox = NotificationInbox::new();
        inbox.push_challenge(&challenge(5, "carol"));
        let entry = inbox.get("challenge-5").unwrap();
        assert!(entry.is_actionable());
        assert_eq!(entry.title(), "New Challenge");
        assert_eq!(entry.description(), "carol challenged you to a game");
    }

    #[tokio::test]
    async fn test_accept_friend_request_entry() {
        let (api, backend) = fake_backend::spawn().await;
        backend
            .pending
            .lock()
            .push(json!({"id": 2, "username": "bob"}));
        let session = SessionStore::new(api, MemoryStore::shared(), Navigator::new());
        session.login("alice", "secret").await.unwrap();

        let inbox = NotificationInbox::new();
        inbox.push_notification(notification(Some(7), "friend_request", "bob"));

        assert!(inbox.accept("7", &session).await.unwrap());
        assert!(backend.called("accept:bob"));
        assert!(inbox.is_empty());
        assert_eq!(session.friends()[0].username, "bob");
    }

    #[tokio::test]
    async fn test_decline_challenge_entry() {
        let (api, backend) = fake_backend::spawn().await;
        let session = SessionStore::new(api, MemoryStore::shared(), Navigator::new());
        session.login("alice", "secret").await.unwrap();

        let inbox = NotificationInbox::new();
        inbox.push_challenge(&challenge(9, "carol"));

        assert!(inbox.decline("challenge-9", &session).await.unwrap());
        assert!(backend.called("challenge-decline:9"));
        assert!(!inbox.accept("challenge-9", &session).await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_resolution_keeps_entry() {
        let (api, _) = fake_backend::spawn().await;
        // not logged in: every REST call fails
        let session = SessionStore::new(api, MemoryStore::shared(), Navigator::new());

        let inbox = NotificationInbox::new();
        inbox.push_challenge(&challenge(9, "carol"));
        assert!(inbox.accept("challenge-9", &session).await.is_err());
        assert_eq!(inbox.len(), 1);
    }
}
