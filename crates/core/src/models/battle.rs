//! Battle lifecycle messages and configuration

use super::social::MiniProfile;
use crate::error::{Result, SyncriftError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type BattleId = i64;

/// Battle category, as encoded by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BattleCategory {
    /// Typing race
    #[serde(rename = "TB")]
    Typing,
    /// CSS replication
    #[serde(rename = "CSS")]
    Css,
    /// Competitive-programming duel
    #[serde(rename = "CF")]
    Codeforces,
}

impl BattleCategory {
    pub fn code(&self) -> &'static str {
        match self {
            BattleCategory::Typing => "TB",
            BattleCategory::Css => "CSS",
            BattleCategory::Codeforces => "CF",
        }
    }
}

impl std::str::FromStr for BattleCategory {
    type Err = SyncriftError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "TB" | "TYPING" => Ok(BattleCategory::Typing),
            "CSS" => Ok(BattleCategory::Css),
            "CF" | "CODEFORCES" => Ok(BattleCategory::Codeforces),
            other => Err(SyncriftError::Config(format!(
                "unknown battle category: {other}"
            ))),
        }
    }
}

// ============================================================================
// INBOUND MESSAGES
// ============================================================================

/// `/user/topic/battle/create`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleCreated {
    pub battle_id: BattleId,
    #[serde(default)]
    pub challenger: Option<MiniProfile>,
    #[serde(default)]
    pub opponent: Option<MiniProfile>,
    pub category: BattleCategory,
    #[serde(default)]
    pub message: Option<String>,
}

/// `/user/topic/battle/start`
///
/// `config` stays untyped on the wire; its shape depends on `category`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleStart {
    pub battle_id: BattleId,
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub category: Option<BattleCategory>,
}

/// `/user/topic/battle/end`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleEnd {
    pub battle_id: BattleId,
    pub result: BattleResult,
    #[serde(default)]
    pub category: Option<BattleCategory>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleResult {
    #[serde(default)]
    pub winner_username: Option<String>,
    #[serde(default)]
    pub loser_username: Option<String>,
    #[serde(default)]
    pub winner_score: Option<String>,
    #[serde(default)]
    pub loser_score: Option<String>,
}

impl BattleResult {
    pub fn is_winner(&self, username: &str) -> bool {
        self.winner_username.as_deref() == Some(username)
    }

    /// (own score, opponent score) from `username`'s point of view
    pub fn scores_for(&self, username: &str) -> (Option<&str>, Option<&str>) {
        if self.is_winner(username) {
            (self.winner_score.as_deref(), self.loser_score.as_deref())
        } else {
            (self.loser_score.as_deref(), self.winner_score.as_deref())
        }
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingConfig {
    pub text: String,
    /// Seconds
    pub duration: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CssConfig {
    pub image_url: String,
    pub duration: u32,
    #[serde(default)]
    pub color1: Option<String>,
    #[serde(default)]
    pub color2: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeforcesConfig {
    #[serde(default)]
    pub min_rating: Option<u32>,
    #[serde(default)]
    pub max_rating: Option<u32>,
    #[serde(default)]
    pub questions: Option<u32>,
    pub duration: u32,
}

/// Category-specific battle configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BattleConfig {
    Typing(TypingConfig),
    Css(CssConfig),
    Codeforces(CodeforcesConfig),
}

impl BattleConfig {
    /// Interpret a raw start-message config for the given category
    pub fn from_value(category: BattleCategory, value: Value) -> Result<Self> {
        Ok(match category {
            BattleCategory::Typing => BattleConfig::Typing(serde_json::from_value(value)?),
            BattleCategory::Css => BattleConfig::Css(serde_json::from_value(value)?),
            BattleCategory::Codeforces => BattleConfig::Codeforces(serde_json::from_value(value)?),
        })
    }

    /// Battle duration in seconds
    pub fn duration(&self) -> u32 {
        match self {
            BattleConfig::Typing(c) => c.duration,
            BattleConfig::Css(c) => c.duration,
            BattleConfig::Codeforces(c) => c.duration,
        }
    }

    pub fn category(&self) -> BattleCategory {
        match self {
            BattleConfig::Typing(_) => BattleCategory::Typing,
            BattleConfig::Css(_) => BattleCategory::Css,
            BattleConfig::Codeforces(_) => BattleCategory::Codeforces,
        }
    }
}

// ============================================================================
// OUTBOUND MESSAGES
// ============================================================================

/// Body of `/app/battle/end`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub battle_id: BattleId,
    pub text: String,
}
