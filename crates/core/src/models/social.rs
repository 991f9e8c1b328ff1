//! Friends, presence, notifications and challenges

use super::battle::BattleCategory;
use crate::error::{Result, SyncriftError};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Offline,
    Online,
    InBattle,
}

/// Full profile as returned by the friends endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub id: Option<i64>,
    pub username: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub level: Option<i32>,
    #[serde(default)]
    pub experience: Option<i32>,
    #[serde(default)]
    pub typing_rating: Option<i32>,
    #[serde(default)]
    pub css_design_rating: Option<i32>,
    #[serde(default)]
    pub codeforces_rating: Option<i32>,
    #[serde(default)]
    pub status: Option<UserStatus>,
}

/// Short profile embedded in battle messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiniProfile {
    #[serde(default)]
    pub id: Option<i64>,
    pub username: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
}

/// Presence change pushed on the status topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    #[serde(default)]
    pub user_id: Option<i64>,
    pub username: String,
    pub status: UserStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendRequest {
    pub username: String,
}

/// Notification pushed on the notifications topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMessage {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub sender_username: Option<String>,
    /// e.g. `friend_request`
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub challenge_id: Option<i64>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChallengeStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
    Cancelled,
}

/// Challenge pushed on the challenge topic and returned by the challenge API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    pub challenge_id: i64,
    #[serde(default)]
    pub sender_username: Option<String>,
    #[serde(default)]
    pub recipient_username: Option<String>,
    #[serde(default)]
    pub status: Option<ChallengeStatus>,
    #[serde(default)]
    pub event_type: Option<BattleCategory>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub expires_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub time_remaining_seconds: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeCreateRequest {
    pub username: String,
    pub event_type: BattleCategory,
    /// Problem set, sent inline for Codeforces challenges only
    #[serde(flatten)]
    pub codeforces: Option<CodeforcesOptions>,
}

/// Problem set requested with a Codeforces challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeforcesOptions {
    pub questions: u32,
    pub min_rating: u32,
    pub max_rating: u32,
    /// Minutes
    pub duration: u32,
}

impl Default for CodeforcesOptions {
    fn default() -> Self {
        Self {
            questions: 3,
            min_rating: 800,
            max_rating: 1500,
            duration: 15,
        }
    }
}

impl CodeforcesOptions {
    pub fn validate(&self) -> Result<()> {
        if self.min_rating > self.max_rating {
            return Err(SyncriftError::Config(
                "Minimum rating cannot be greater than maximum rating".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_update_parses_backend_enum() {
        let update: StatusUpdate =
            serde_json::from_str(r#"{"userId":5,"username":"bob","status":"IN_BATTLE"}"#).unwrap();
        assert_eq!(update.status, UserStatus::InBattle);
    }

    #[test]
    fn test_notification_type_field() {
        let n: NotificationMessage = serde_json::from_str(
            r#"{"id":9,"senderUsername":"bob","type":"friend_request","message":"hi","read":false}"#,
        )
        .unwrap();
        assert_eq!(n.kind.as_deref(), Some("friend_request"));
        assert_eq!(n.sender_username.as_deref(), Some("bob"));
    }

    #[test]
    fn test_codeforces_options_sent_inline() {
        let request = ChallengeCreateRequest {
            username: "bob".to_string(),
            event_type: BattleCategory::Codeforces,
            codeforces: Some(CodeforcesOptions::default()),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "username": "bob", "eventType": "CF",
                "questions": 3, "minRating": 800, "maxRating": 1500, "duration": 15
            })
        );

        let typing = ChallengeCreateRequest {
            username: "bob".to_string(),
            event_type: BattleCategory::Typing,
            codeforces: None,
        };
        assert_eq!(
            serde_json::to_value(&typing).unwrap(),
            serde_json::json!({"username": "bob", "eventType": "TB"})
        );
    }

    #[test]
    fn test_inverted_rating_range_is_rejected() {
        let options = CodeforcesOptions {
            min_rating: 1800,
            max_rating: 1200,
            ..CodeforcesOptions::default()
        };
        assert!(matches!(options.validate(), Err(SyncriftError::Config(_))));
        assert!(CodeforcesOptions::default().validate().is_ok());
    }

    #[test]
    fn test_challenge_parses_timestamps() {
        let c: Challenge = serde_json::from_str(
            r#"{"challengeId":12,"senderUsername":"bob","status":"PENDING","eventType":"TB",
                "createdAt":"2025-03-01T10:00:00","expiresAt":"2025-03-01T10:05:00"}"#,
        )
        .unwrap();
        assert_eq!(c.event_type, Some(BattleCategory::Typing));
        assert!(c.expires_at.unwrap() > c.created_at.unwrap());
    }
}
