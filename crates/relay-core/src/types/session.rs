//! Authenticated identity attached to a single connection.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Scope granted to web-session credentials.
pub const FULL_ACCESS_SCOPE: &str = "*";

/// Identity produced by a credential verifier.
///
/// `key` identifies the exact credential so that invalidation events
/// (`logout`, `verified`) can target it. The verification flags are the
/// only mutable part and change in response to session-control events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    /// Credential key, e.g. `oauth:<token id>` or the session store key.
    pub key: String,
    /// Authenticated account.
    pub user_id: u64,
    /// Capabilities granted to the credential.
    pub scopes: HashSet<String>,
    /// Whether non-essential events require a verified session.
    pub requires_verification: bool,
    /// Whether the session has completed verification.
    pub verified: bool,
    /// Client address, for diagnostics only.
    pub ip: Option<String>,
}

impl UserSession {
    /// Returns whether application events may be delivered.
    pub fn can_receive_events(&self) -> bool {
        !self.requires_verification || self.verified
    }

    /// Returns whether the credential carries `scope` or the wildcard.
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(FULL_ACCESS_SCOPE) || self.scopes.contains(scope)
    }
}
