//! Syncrift Realtime
//!
//! One STOMP-over-WebSocket connection to the battle broker, shared by the
//! whole client. See [`ChannelManager`].

pub mod connector;
pub mod frame;
pub mod manager;
pub mod state;
pub mod test_broker;

pub use connector::{Connector, Link, WsConnector};
pub use frame::{Command, Frame};
pub use manager::{
    handler, json_handler, BrokerMessage, ChannelManager, MessageHandler, SubscriptionGuard,
    SubscriptionHandle,
};
pub use state::{ConnectionEvent, ConnectionState};
pub use test_broker::TestBroker;
