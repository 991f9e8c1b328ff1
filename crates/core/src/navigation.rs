//! Client navigation stages
//!
//! The headless client has no pages; "navigating" commits a [`Stage`] that
//! callers observe through a watch channel.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Landing,
    Friends,
    WaitingRoom,
    Battle,
    Results,
}

impl Stage {
    /// Position in the battle flow; `None` outside it.
    pub fn battle_rank(&self) -> Option<u8> {
        match self {
            Stage::WaitingRoom => Some(0),
            Stage::Battle => Some(1),
            Stage::Results => Some(2),
            Stage::Landing | Stage::Friends => None,
        }
    }

    pub fn is_battle_flow(&self) -> bool {
        self.battle_rank().is_some()
    }

    pub fn path(&self) -> &'static str {
        match self {
            Stage::Landing => "/",
            Stage::Friends => "/friends",
            Stage::WaitingRoom => "/waiting-room",
            Stage::Battle => "/battle",
            Stage::Results => "/battleresult",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Shared navigation target
#[derive(Clone)]
pub struct Navigator {
    tx: Arc<watch::Sender<Stage>>,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Stage::Landing);
        Self { tx: Arc::new(tx) }
    }

    pub fn navigate(&self, stage: Stage) {
        debug!("Navigating to {}", stage);
        self.tx.send_replace(stage);
    }

    pub fn current(&self) -> Stage {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Stage> {
        self.tx.subscribe()
    }
}
