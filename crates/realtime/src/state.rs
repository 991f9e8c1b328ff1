//! Broker connection state machine

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// A single reconnect timer is armed
    ReconnectPending,
}

/// Events that drive [`ConnectionState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    ConnectRequested,
    HandshakeSucceeded,
    HandshakeFailed,
    LinkLost,
    ReconnectScheduled,
    Shutdown,
}

impl ConnectionState {
    /// Next state for `event`, or `None` when the transition is invalid.
    pub fn on(self, event: ConnectionEvent) -> Option<ConnectionState> {
        use ConnectionEvent::*;
        use ConnectionState::*;

        match (self, event) {
            (_, Shutdown) => Some(Disconnected),

            (Disconnected, ConnectRequested) => Some(Connecting),
            (Disconnected, HandshakeFailed | LinkLost) => Some(Disconnected),
            (Disconnected, ReconnectScheduled) => Some(ReconnectPending),

            (Connecting, HandshakeSucceeded) => Some(Connected),
            (Connecting, HandshakeFailed | LinkLost) => Some(Disconnected),

            (Connected, HandshakeFailed | LinkLost) => Some(Disconnected),

            (ReconnectPending, ConnectRequested) => Some(Connecting),
            (ReconnectPending, HandshakeFailed | LinkLost) => Some(ReconnectPending),

            _ => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::ReconnectPending => "reconnect-pending",
        };
        f.write_str(s)
    }
}
