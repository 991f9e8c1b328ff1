//! Syncrift Session
//!
//! REST side of the client: authentication, the friend graph, challenges
//! and the notification inbox.

pub mod api;
pub mod notifications;
pub mod store;

#[cfg(test)]
mod fake_backend;

pub use api::ApiClient;
pub use notifications::{InboxEntry, NotificationInbox, NotificationKind};
pub use store::SessionStore;
