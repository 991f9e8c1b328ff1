//! Wire models shared with the backend (JSON, camelCase)

pub mod auth;
pub mod battle;
pub mod social;

pub use auth::*;
pub use battle::*;
pub use social::*;
