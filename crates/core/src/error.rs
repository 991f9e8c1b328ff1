//! Error types for the Syncrift client

use thiserror::Error;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, SyncriftError>;

/// Client errors
#[derive(Error, Debug)]
pub enum SyncriftError {
    // ========== REST errors ==========
    /// Non-success response; `message` is the text the backend wants shown.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("HTTP error: {0}")]
    Http(String),

    // ========== Broker errors ==========
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Timeout")]
    Timeout,

    // ========== Local errors ==========
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SyncriftError {
    /// Message suitable for a transient user notification.
    pub fn user_message(&self) -> String {
        match self {
            SyncriftError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            SyncriftError::Unauthenticated | SyncriftError::Api { status: 401, .. }
        )
    }
}

impl From<serde_json::Error> for SyncriftError {
    fn from(err: serde_json::Error) -> Self {
        SyncriftError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for SyncriftError {
    fn from(err: std::io::Error) -> Self {
        SyncriftError::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for SyncriftError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncriftError::Timeout
        } else {
            SyncriftError::Http(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_displays_server_message() {
        let err = SyncriftError::Api {
            status: 400,
            message: "Username already taken".to_string(),
        };
        assert_eq!(err.to_string(), "Username already taken");
        assert_eq!(err.user_message(), "Username already taken");
    }

    #[test]
    fn test_unauthorized_detection() {
        assert!(SyncriftError::Unauthenticated.is_unauthorized());
        assert!(SyncriftError::Api {
            status: 401,
            message: "expired".into()
        }
        .is_unauthorized());
        assert!(!SyncriftError::Connection("refused".into()).is_unauthorized());
    }

    #[test]
    fn test_json_error_maps_to_serialization() {
        let err: SyncriftError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, SyncriftError::Serialization(_)));
    }
}
