//! Frames queued for a connection's socket writer.

use std::sync::Arc;

/// Synthetic frame telling the client its session ended.
pub const LOGOUT_FRAME: &str = r#"{"event":"logout"}"#;

/// Synthetic frame telling the client its session is now verified.
pub const VERIFIED_FRAME: &str = r#"{"event":"verified"}"#;

/// An outbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// JSON text, forwarded byte-for-byte.
    Text(Arc<str>),
    /// Liveness ping.
    Ping,
}

impl OutboundFrame {
    /// A static text frame.
    pub fn text(text: &str) -> Self {
        Self::Text(Arc::from(text))
    }
}
