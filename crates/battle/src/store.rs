//! Battle session slot
//!
//! Holds at most one battle. Broker messages move it through
//! created → started → ended, and every step navigates through the
//! [`StageGuard`]. A newer "created" replaces whatever was there.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use syncrift_core::{BattleCreated, BattleEnd, BattleId, BattleStart, Stage};

use crate::guard::StageGuard;
use crate::session::BattleSession;

#[derive(Clone)]
pub struct BattleSessionStore {
    slot: Arc<RwLock<Option<BattleSession>>>,
    guard: StageGuard,
}

impl BattleSessionStore {
    pub fn new(guard: StageGuard) -> Self {
        Self {
            slot: Arc::new(RwLock::new(None)),
            guard,
        }
    }

    pub fn guard(&self) -> &StageGuard {
        &self.guard
    }

    pub fn snapshot(&self) -> Option<BattleSession> {
        self.slot.read().clone()
    }

    pub fn battle_id(&self) -> Option<BattleId> {
        self.slot.read().as_ref().map(|s| s.battle_id)
    }

    /// Replace the slot and enter the waiting room
    pub fn on_created(&self, msg: BattleCreated) {
        let battle_id = msg.battle_id;
        let previous = self
            .slot
            .write()
            .replace(BattleSession::from_created(msg))
            .map(|s| s.battle_id);
        if let Some(previous) = previous {
            info!(battle_id, previous, "Battle superseded");
        } else {
            info!(battle_id, "Battle created");
        }
        self.guard.enter(Stage::WaitingRoom, Some(battle_id));
    }

    /// Attach the configuration and enter the battle stage.
    /// Returns false when the message is not for the current battle.
    pub fn on_start(&self, msg: BattleStart) -> bool {
        {
            let mut slot = self.slot.write();
            let Some(session) = slot.as_mut().filter(|s| s.battle_id == msg.battle_id) else {
                warn!(battle_id = msg.battle_id, "Ignoring start for unknown battle");
                return false;
            };
            if let Some(category) = msg.category.filter(|c| *c != session.category) {
                warn!(battle_id = msg.battle_id, ?category, "Start category differs from created");
            }
            session.raw_config = Some(msg.config);
        }
        info!(battle_id = msg.battle_id, "Battle started");
        self.guard.enter(Stage::Battle, Some(msg.battle_id))
    }

    /// Attach the result and enter the results stage.
    /// Returns false when the message is not for the current battle.
    pub fn on_end(&self, msg: BattleEnd) -> bool {
        {
            let mut slot = self.slot.write();
            let Some(session) = slot.as_mut().filter(|s| s.battle_id == msg.battle_id) else {
                warn!(battle_id = msg.battle_id, "Ignoring end for unknown battle");
                return false;
            };
            session.result = Some(msg.result);
        }
        info!(battle_id = msg.battle_id, "Battle ended");
        self.guard.enter(Stage::Results, Some(msg.battle_id))
    }

    /// Drop the battle and go back to landing
    pub fn return_to_landing(&self) {
        self.slot.write().take();
        self.guard.navigator().navigate(Stage::Landing);
    }

    /// Enter a battle-flow stage for the current battle, as a refresh or
    /// typed URL would. The guard decides.
    pub fn revisit(&self, stage: Stage) -> bool {
        self.guard.enter(stage, self.battle_id())
    }
}
