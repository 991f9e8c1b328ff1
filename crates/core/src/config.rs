//! Client configuration
//!
//! `ClientConfig` is serializable with durations as plain seconds so it can be
//! stored next to the client state or produced by external tooling.

use crate::error::{Result, SyncriftError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8081";
pub const DEFAULT_BROKER_URL: &str = "ws://localhost:8081/ws/websocket";
pub const DEFAULT_DATA_DIR: &str = "./.syncrift";

/// Client configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the REST backend
    pub api_url: String,
    /// STOMP-over-WebSocket broker endpoint
    pub broker_url: String,
    /// Directory holding the durable client state
    pub data_dir: PathBuf,
    /// Fixed delay before the single pending reconnect attempt
    #[serde(with = "duration_secs")]
    pub reconnect_delay: Duration,
    /// Upper bound on the broker CONNECT/CONNECTED exchange
    #[serde(with = "duration_secs")]
    pub handshake_timeout: Duration,
    /// Per-request timeout for REST calls
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            broker_url: DEFAULT_BROKER_URL.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            reconnect_delay: Duration::from_secs(3),
            handshake_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Create from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let reconnect_delay = match std::env::var("SYNCRIFT_RECONNECT_DELAY_SECS") {
            Ok(raw) => Duration::from_secs(raw.parse().map_err(|_| {
                SyncriftError::Config(format!("SYNCRIFT_RECONNECT_DELAY_SECS is not a number: {raw}"))
            })?),
            Err(_) => defaults.reconnect_delay,
        };

        Ok(Self {
            api_url: std::env::var("SYNCRIFT_API_URL").unwrap_or(defaults.api_url),
            broker_url: std::env::var("SYNCRIFT_BROKER_URL").unwrap_or(defaults.broker_url),
            data_dir: std::env::var("SYNCRIFT_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            reconnect_delay,
            ..defaults
        })
    }

    /// Path of the durable state file
    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join("state.json")
    }

    /// Base URL without a trailing slash
    pub fn api_base(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }
}

/// Serde helper storing a `Duration` as whole seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
