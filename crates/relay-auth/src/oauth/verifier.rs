//! Verifies RS256 access tokens and checks them against the token directory.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use tracing::debug;

use relay_core::config::AuthConfig;
use relay_core::error::{AppError, ErrorKind};
use relay_core::result::AppResult;
use relay_core::traits::TokenDirectory;
use relay_core::types::UserSession;
use relay_core::types::session::FULL_ACCESS_SCOPE;

use super::claims::AccessTokenClaims;
use crate::error::AuthError;
use crate::request::HandshakeRequest;
use crate::verifier::SessionVerifier;

/// Session key prefix for token-backed sessions.
const SESSION_KEY_PREFIX: &str = "oauth:";

/// Bearer-token verifier.
pub struct OAuthVerifier {
    /// Public half of the token signing key.
    decoding_key: DecodingKey,
    /// Validation configuration.
    validation: Validation,
    /// Token lookups.
    tokens: Arc<dyn TokenDirectory>,
    /// Scope accepted besides the wildcard.
    required_scope: String,
}

impl std::fmt::Debug for OAuthVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthVerifier")
            .field("validation", &self.validation)
            .field("required_scope", &self.required_scope)
            .finish()
    }
}

impl OAuthVerifier {
    /// Creates a verifier from a PEM-encoded RSA public key.
    pub fn new(
        public_key_pem: &[u8],
        tokens: Arc<dyn TokenDirectory>,
        required_scope: impl Into<String>,
    ) -> AppResult<Self> {
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem).map_err(|e| {
            AppError::configuration(format!("Invalid OAuth public key: {e}"))
        })?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;
        // audience is the issuing client, which varies per token
        validation.validate_aud = false;
        validation.leeway = 5;

        Ok(Self {
            decoding_key,
            validation,
            tokens,
            required_scope: required_scope.into(),
        })
    }

    /// Creates a verifier reading the key file named in the configuration.
    pub fn from_config(config: &AuthConfig, tokens: Arc<dyn TokenDirectory>) -> AppResult<Self> {
        let path = Path::new(&config.oauth_public_key_path);
        let pem = std::fs::read(path).map_err(|e| {
            AppError::with_source(
                ErrorKind::Configuration,
                format!("Failed to read OAuth public key {}", path.display()),
                e,
            )
        })?;
        Self::new(&pem, tokens, config.oauth_scope.clone())
    }

    /// Checks the signature and expiry, returning the token id.
    fn decode_token_id(&self, token: &str) -> Result<String, AuthError> {
        let data = decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    AuthError::Integrity("invalid token signature".to_string())
                }
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AuthError::Directory("token has expired".to_string())
                }
                _ => AuthError::Malformed(format!("token validation failed: {e}")),
            })?;

        if data.claims.jti.is_empty() {
            return Err(AuthError::Malformed("token has no id".to_string()));
        }
        Ok(data.claims.jti)
    }

    fn grants_access(&self, scopes: &[String]) -> bool {
        scopes
            .iter()
            .any(|scope| scope == FULL_ACCESS_SCOPE || *scope == self.required_scope)
    }
}

#[async_trait]
impl SessionVerifier for OAuthVerifier {
    fn name(&self) -> &'static str {
        "oauth"
    }

    async fn verify(&self, request: &HandshakeRequest) -> Result<Option<UserSession>, AuthError> {
        let Some(token) = request.bearer_token() else {
            return Ok(None);
        };

        let token_id = self.decode_token_id(token)?;

        let record = self
            .tokens
            .find_active_token(&token_id)
            .await?
            .ok_or_else(|| AuthError::Directory("token doesn't exist".to_string()))?;

        if !self.grants_access(&record.scopes) {
            return Err(AuthError::Directory("missing required scope".to_string()));
        }

        debug!(user_id = record.user_id, "OAuth token accepted");

        Ok(Some(UserSession {
            key: format!("{SESSION_KEY_PREFIX}{token_id}"),
            user_id: record.user_id,
            scopes: record.scopes.into_iter().collect::<HashSet<_>>(),
            requires_verification: true,
            verified: record.verified,
            ip: request.ip.clone(),
        }))
    }
}
