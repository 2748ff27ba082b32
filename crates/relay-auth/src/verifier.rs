//! Common interface of the credential verifiers.

use async_trait::async_trait;

use relay_core::types::UserSession;

use crate::error::AuthError;
use crate::request::HandshakeRequest;

/// Turns a handshake into a session.
///
/// `Ok(None)` means this verifier found no credential of its kind and the
/// next verifier should be tried.
#[async_trait]
pub trait SessionVerifier: Send + Sync + std::fmt::Debug + 'static {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Verifies the request.
    async fn verify(&self, request: &HandshakeRequest) -> Result<Option<UserSession>, AuthError>;
}
