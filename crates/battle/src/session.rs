//! The active battle

use serde_json::Value;

use syncrift_core::{
    BattleCategory, BattleConfig, BattleCreated, BattleId, BattleResult, MiniProfile, Result,
};

#[derive(Debug, Clone, PartialEq)]
pub struct BattleSession {
    pub battle_id: BattleId,
    pub category: BattleCategory,
    pub challenger: Option<MiniProfile>,
    pub opponent: Option<MiniProfile>,
    pub message: Option<String>,
    /// Raw start configuration; see [`config`](Self::config)
    pub raw_config: Option<Value>,
    pub result: Option<BattleResult>,
}

impl BattleSession {
    pub fn from_created(msg: BattleCreated) -> Self {
        Self {
            battle_id: msg.battle_id,
            category: msg.category,
            challenger: msg.challenger,
            opponent: msg.opponent,
            message: msg.message,
            raw_config: None,
            result: None,
        }
    }

    /// Typed configuration for this battle's category, once started
    pub fn config(&self) -> Result<Option<BattleConfig>> {
        self.raw_config
            .clone()
            .map(|raw| BattleConfig::from_value(self.category, raw))
            .transpose()
    }

    pub fn is_started(&self) -> bool {
        self.raw_config.is_some()
    }

    pub fn is_finished(&self) -> bool {
        self.result.is_some()
    }

    /// The other player from `username`'s side
    pub fn opponent_of(&self, username: &str) -> Option<&MiniProfile> {
        match (&self.challenger, &self.opponent) {
            (Some(c), other) if c.username == username => other.as_ref(),
            (challenger, _) => challenger.as_ref(),
        }
    }
}
