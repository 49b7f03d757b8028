//! GDAX Websocket Feed Adapters
//!
//! - `messages`: subscribe request/acknowledgement wire types
//! - `codec`: JSON framing for requests, replies and data messages
//! - `transport`: `tokio-tungstenite` implementation of the transport ports
//! - `supervisor`: startup, read loops and shutdown of all connections

mod codec;
mod messages;
mod supervisor;
mod transport;

pub use codec::{CodecError, JsonCodec};
pub use messages::{ChannelEntry, SUBSCRIBE_TYPE, SubscribeMessage};
pub use supervisor::{
    ConnectionSupervisor, DEFAULT_HANDSHAKE_TIMEOUT, StartupError, SupervisorSettings,
};
pub use transport::{WsConnection, WsDialer};
