//! Syncrift Battle
//!
//! The active battle slot, the stage guard that keeps the waiting room →
//! battle → results flow one-way, and the broker wiring that feeds both.

pub mod coordinator;
pub mod guard;
pub mod session;
pub mod store;

pub use coordinator::BattleCoordinator;
pub use guard::{GuardDecision, RedirectReason, StageGuard, StageMarker};
pub use session::BattleSession;
pub use store::BattleSessionStore;
