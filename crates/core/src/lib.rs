//! Syncrift Core
//!
//! Types shared by every Syncrift client crate:
//! - Wire models for the REST backend and the broker topics
//! - Topic names
//! - `ClientConfig`
//! - `SyncriftError`
//! - Durable key-value storage (credential + stage marker)
//! - Stage navigation

pub mod config;
pub mod error;
pub mod models;
pub mod navigation;
pub mod storage;
pub mod topics;

pub use config::ClientConfig;
pub use error::{Result, SyncriftError};
pub use models::*;
pub use navigation::{Navigator, Stage};
pub use storage::{FileStore, MemoryStore, SharedStore, StateStore};
