//! Stage guard for the battle flow
//!
//! A durable marker `{battleId, stage}` records the furthest battle-flow
//! stage entered for a battle. Entering a stage the marker has already
//! reached (or passed) for the same battle means the page is being replayed
//! by a refresh, back navigation or a typed URL, so the client goes to
//! landing instead.
//!
//! | in-memory id | marker              | entering     | decision |
//! |--------------|---------------------|--------------|----------|
//! | none         | any                 | any          | redirect |
//! | 7            | none / other battle | any          | proceed  |
//! | 7            | 7 @ waiting room    | battle       | proceed  |
//! | 7            | 7 @ battle          | battle       | redirect |
//! | 7            | 7 @ results         | waiting room | redirect |

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use syncrift_core::storage::BATTLE_MARKER_KEY;
use syncrift_core::{BattleId, Navigator, SharedStore, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageMarker {
    pub battle_id: BattleId,
    pub stage: Stage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectReason {
    NoActiveBattle,
    AlreadyVisited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Proceed,
    Redirect(RedirectReason),
}

#[derive(Clone)]
pub struct StageGuard {
    storage: SharedStore,
    navigator: Navigator,
}

impl StageGuard {
    pub fn new(storage: SharedStore, navigator: Navigator) -> Self {
        Self { storage, navigator }
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn marker(&self) -> Option<StageMarker> {
        let raw = self.storage.get(BATTLE_MARKER_KEY)?;
        if let Ok(marker) = serde_json::from_str::<StageMarker>(&raw) {
            return Some(marker);
        }
        // A bare id carries no stage; treat it as fully consumed
        match raw.trim().parse::<BattleId>() {
            Ok(battle_id) => Some(StageMarker {
                battle_id,
                stage: Stage::Results,
            }),
            Err(_) => {
                warn!("Ignoring unreadable stage marker: {}", raw);
                None
            }
        }
    }

    /// Decide whether `stage` may be entered for `battle_id`, recording the
    /// marker when it may.
    pub fn check(&self, stage: Stage, battle_id: Option<BattleId>) -> GuardDecision {
        let Some(rank) = stage.battle_rank() else {
            return GuardDecision::Proceed;
        };
        let Some(battle_id) = battle_id else {
            return GuardDecision::Redirect(RedirectReason::NoActiveBattle);
        };

        if let Some(marker) = self.marker() {
            let reached = marker.stage.battle_rank().unwrap_or(u8::MAX);
            if marker.battle_id == battle_id && reached >= rank {
                return GuardDecision::Redirect(RedirectReason::AlreadyVisited);
            }
        }

        let marker = StageMarker { battle_id, stage };
        match serde_json::to_string(&marker) {
            Ok(raw) => {
                // blocking file write on the broker reader task; the marker
                // must be on disk before the stage is entered
                if let Err(e) = self.storage.set(BATTLE_MARKER_KEY, &raw) {
                    warn!("Failed to persist stage marker: {}", e);
                }
            }
            Err(e) => warn!("Failed to encode stage marker: {}", e),
        }
        GuardDecision::Proceed
    }

    /// Navigate to `stage` if the guard allows it, otherwise to landing.
    /// Returns whether the stage was entered.
    pub fn enter(&self, stage: Stage, battle_id: Option<BattleId>) -> bool {
        match self.check(stage, battle_id) {
            GuardDecision::Proceed => {
                self.navigator.navigate(stage);
                true
            }
            GuardDecision::Redirect(reason) => {
                debug!(?reason, ?battle_id, "Stage {} refused, returning to landing", stage);
                self.navigator.navigate(Stage::Landing);
                false
            }
        }
    }
}
