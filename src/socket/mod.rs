//! Real-time in-app delivery: the duplex-socket transport, its per-instance
//! connection registry, and the handler that wires both to `AppState`.

mod connection;
mod handler;
mod heartbeat;
mod message;
mod registry;

pub use connection::ConnectionHandle;
pub use handler::{ws_handler, WsQuery};
pub use heartbeat::HeartbeatTask;
pub use message::{ClientMessage, OutboundMessage, PushEnvelope, ServerMessage};
pub use registry::{ConnectionManager, ConnectionStats};
