//! Authentication error taxonomy.
//!
//! "No credential presented" is not an error: verifiers return `Ok(None)`
//! and the resolver moves on. Everything here is a hard rejection.

use thiserror::Error;

use relay_core::error::AppError;

use crate::laravel::php::PhpError;

/// Why a verifier rejected a presented credential.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The credential could not be decoded.
    #[error("malformed credential: {0}")]
    Malformed(String),
    /// A MAC, tag or signature did not match.
    #[error("integrity check failed: {0}")]
    Integrity(String),
    /// The CSRF parameter was missing or wrong.
    #[error("csrf check failed: {0}")]
    Csrf(&'static str),
    /// The directory rejected the credential (unknown, revoked, expired,
    /// wrong scope).
    #[error("{0}")]
    Directory(String),
    /// The stored session record could not be decoded.
    #[error("unreadable session record: {0}")]
    Record(#[from] PhpError),
    /// A backing store failed while verifying.
    #[error("credential lookup failed: {0}")]
    Store(#[from] AppError),
}

impl AuthError {
    /// Whether the credential was tampered with or signed by someone else.
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity(_))
    }
}

/// Client-facing authentication failure.
///
/// Always renders as `authentication failed`; the detailed reason is only
/// for server logs.
#[derive(Debug, Error)]
#[error("authentication failed")]
pub struct AuthFailure {
    reason: String,
}

impl AuthFailure {
    /// JSON frame sent to the client before terminating the socket.
    pub const CLIENT_FRAME: &'static str = r#"{"error":"authentication failed"}"#;

    /// Creates a failure with a detailed reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Detailed reason, for logging only.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_hides_reason() {
        let failure = AuthFailure::new("integrity check failed: bad mac");
        assert_eq!(failure.to_string(), "authentication failed");
        assert_eq!(failure.reason(), "integrity check failed: bad mac");
    }

    #[test]
    fn test_client_frame_is_json() {
        let frame: serde_json::Value = serde_json::from_str(AuthFailure::CLIENT_FRAME).unwrap();
        assert_eq!(frame["error"], "authentication failed");
    }
}
