//! State shared across handlers.

use std::sync::Arc;

use relay_auth::IdentityResolver;
use relay_realtime::RelayEngine;

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Handshake credential resolver.
    pub resolver: Arc<IdentityResolver>,
    /// Connection engine.
    pub engine: RelayEngine,
}

impl AppState {
    /// Creates the state from its collaborators.
    pub fn new(resolver: Arc<IdentityResolver>, engine: RelayEngine) -> Self {
        Self { resolver, engine }
    }
}
