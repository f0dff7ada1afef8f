//! Connection roles, peer links, and lifecycle.

mod manager;
mod state;


pub use manager::{ConnectionManager, InboundFrame, SendTarget};
pub use state::{ArrayEvent, ConnectionState, DisconnectReason, LinkStats};
