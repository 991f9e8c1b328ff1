//! Broker wiring for the battle flow

use tracing::{info, warn};

use syncrift_core::{topics, BattleCreated, BattleEnd, BattleId, BattleStart, Submission};
use syncrift_realtime::{json_handler, ChannelManager, SubscriptionGuard};

use crate::store::BattleSessionStore;

#[derive(Clone)]
pub struct BattleCoordinator {
    channel: ChannelManager,
    store: BattleSessionStore,
}

impl BattleCoordinator {
    pub fn new(channel: ChannelManager, store: BattleSessionStore) -> Self {
        Self { channel, store }
    }

    pub fn store(&self) -> &BattleSessionStore {
        &self.store
    }

    /// Subscribe the create/start/end topics. Dropping the returned guards
    /// unsubscribes them.
    pub fn attach(&self) -> Vec<SubscriptionGuard> {
        let created = self.store.clone();
        let started = self.store.clone();
        let ended = self.store.clone();

        vec![
            self.channel.subscribe_with_cleanup(
                topics::BATTLE_CREATE,
                json_handler(move |msg: BattleCreated| created.on_created(msg)),
            ),
            self.channel.subscribe_with_cleanup(
                topics::BATTLE_START,
                json_handler(move |msg: BattleStart| {
                    started.on_start(msg);
                }),
            ),
            self.channel.subscribe_with_cleanup(
                topics::BATTLE_END,
                json_handler(move |msg: BattleEnd| {
                    ended.on_end(msg);
                }),
            ),
        ]
    }

    /// Tell the backend this player is ready. Returns the battle id, or
    /// `None` when there is no battle.
    pub fn ready(&self) -> Option<BattleId> {
        let Some(battle_id) = self.store.battle_id() else {
            warn!("No active battle to ready up for");
            return None;
        };
        self.channel.publish(topics::APP_BATTLE_READY, &battle_id);
        info!(battle_id, "Ready");
        Some(battle_id)
    }

    /// Send the final answer for the current battle
    pub fn submit(&self, text: impl Into<String>) -> Option<BattleId> {
        let Some(battle_id) = self.store.battle_id() else {
            warn!("No active battle to submit to");
            return None;
        };
        let submission = Submission {
            battle_id,
            text: text.into(),
        };
        self.channel.publish(topics::APP_BATTLE_END, &submission);
        info!(battle_id, "Submission sent");
        Some(battle_id)
    }
}
