//! WebSocket transport for relay connections.

mod handler;
mod message;

pub use handler::ws_handler;
pub use message::{ClientFrame, OutboundMessage, ServerMessage};
