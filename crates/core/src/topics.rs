//! Broker destinations used by the client

/// Per-user notification feed (friend requests, generic notices)
pub const NOTIFICATIONS: &str = "/user/topic/notifications";
/// Incoming battle challenges
pub const CHALLENGE: &str = "/user/topic/challenge";
/// Presence updates for friends
pub const USER_STATUS: &str = "/user/topic/user/status";
pub const BATTLE_CREATE: &str = "/user/topic/battle/create";
pub const BATTLE_START: &str = "/user/topic/battle/start";
pub const BATTLE_END: &str = "/user/topic/battle/end";

/// Readiness signal; body is the bare numeric battle id
pub const APP_BATTLE_READY: &str = "/app/battle/ready";
/// Submission signal; body is `{battleId, text}`
pub const APP_BATTLE_END: &str = "/app/battle/end";
