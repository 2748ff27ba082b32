//! Per-client connection state machine.

pub mod heartbeat;
pub mod state;
pub mod user_connection;

pub use state::ConnectionState;
pub use user_connection::{ConnectionContext, UserConnection};
