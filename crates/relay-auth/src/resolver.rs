//! Ordered verifier chain producing exactly one session or one failure.

use std::sync::Arc;

use tracing::{debug, info};

use relay_core::types::UserSession;

use crate::error::AuthFailure;
use crate::request::HandshakeRequest;
use crate::verifier::SessionVerifier;

/// Tries each verifier in order; the first session wins and the first hard
/// error rejects the handshake.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    verifiers: Vec<Arc<dyn SessionVerifier>>,
    cookie_name: String,
}

impl IdentityResolver {
    /// Creates a resolver. `cookie_name` is used to tell whether a session
    /// cookie was presented when every verifier comes back empty.
    pub fn new(verifiers: Vec<Arc<dyn SessionVerifier>>, cookie_name: impl Into<String>) -> Self {
        Self {
            verifiers,
            cookie_name: cookie_name.into(),
        }
    }

    /// Resolves the handshake to a session.
    pub async fn resolve(&self, request: &HandshakeRequest) -> Result<UserSession, AuthFailure> {
        let ip = request.ip.as_deref().unwrap_or("-");

        for verifier in &self.verifiers {
            match verifier.verify(request).await {
                Ok(Some(session)) => {
                    debug!(
                        verifier = verifier.name(),
                        user_id = session.user_id,
                        ip = %ip,
                        "Handshake authenticated"
                    );
                    return Ok(session);
                }
                Ok(None) => continue,
                Err(e) => {
                    info!(
                        verifier = verifier.name(),
                        ip = %ip,
                        integrity = e.is_integrity(),
                        reason = %e,
                        "Authentication failed"
                    );
                    return Err(AuthFailure::new(e.to_string()));
                }
            }
        }

        let reason = if request.has_credentials(&self.cookie_name) {
            "no valid session for presented credential"
        } else {
            "missing authentication header/cookie"
        };
        info!(ip = %ip, reason = reason, "Authentication failed");
        Err(AuthFailure::new(reason))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::AuthError;

    #[derive(Debug)]
    enum Outcome {
        Session(u64),
        Nothing,
        Reject,
    }

    #[derive(Debug)]
    struct Fixed {
        outcome: Outcome,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(outcome: Outcome) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SessionVerifier for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn verify(&self, _: &HandshakeRequest) -> Result<Option<UserSession>, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outcome {
                Outcome::Session(user_id) => Ok(Some(UserSession {
                    key: format!("test:{user_id}"),
                    user_id,
                    scopes: HashSet::new(),
                    requires_verification: false,
                    verified: false,
                    ip: None,
                })),
                Outcome::Nothing => Ok(None),
                Outcome::Reject => Err(AuthError::Integrity("bad signature".to_string())),
            }
        }
    }

    fn resolver(first: Arc<Fixed>, second: Arc<Fixed>) -> IdentityResolver {
        IdentityResolver::new(vec![first as Arc<dyn SessionVerifier>, second], "osu_session")
    }

    #[tokio::test]
    async fn test_first_verifier_wins() {
        let first = Fixed::new(Outcome::Session(1));
        let second = Fixed::new(Outcome::Session(2));
        let session = resolver(first.clone(), second.clone())
            .resolve(&HandshakeRequest::default())
            .await
            .unwrap();

        assert_eq!(session.user_id, 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_falls_back_on_no_session() {
        let session = resolver(Fixed::new(Outcome::Nothing), Fixed::new(Outcome::Session(2)))
            .resolve(&HandshakeRequest::default())
            .await
            .unwrap();
        assert_eq!(session.user_id, 2);
    }

    #[tokio::test]
    async fn test_hard_error_stops_chain() {
        let second = Fixed::new(Outcome::Session(2));
        let failure = resolver(Fixed::new(Outcome::Reject), second.clone())
            .resolve(&HandshakeRequest::default())
            .await
            .unwrap_err();

        assert_eq!(failure.to_string(), "authentication failed");
        assert!(failure.reason().contains("bad signature"));
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_credentials_reason() {
        let failure = resolver(Fixed::new(Outcome::Nothing), Fixed::new(Outcome::Nothing))
            .resolve(&HandshakeRequest::default())
            .await
            .unwrap_err();
        assert_eq!(failure.reason(), "missing authentication header/cookie");

        let request = HandshakeRequest {
            cookie_header: Some("osu_session=abc".to_string()),
            ..Default::default()
        };
        let failure = resolver(Fixed::new(Outcome::Nothing), Fixed::new(Outcome::Nothing))
            .resolve(&request)
            .await
            .unwrap_err();
        assert_eq!(failure.reason(), "no valid session for presented credential");
    }
}
