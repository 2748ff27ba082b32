//! Encrypted web-session cookie verification.
//!
//! The cookie decrypts to a session id; the session record is read from
//! the shared store and must carry a user id and a CSRF token matching the
//! `csrf` query parameter.

pub mod encrypter;
pub mod php;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use relay_core::config::AuthConfig;
use relay_core::result::AppResult;
use relay_core::traits::SessionStore;
use relay_core::types::UserSession;
use relay_core::types::session::FULL_ACCESS_SCOPE;

use crate::compare::constant_time_eq;
use crate::error::AuthError;
use crate::request::HandshakeRequest;
use crate::verifier::SessionVerifier;

use self::encrypter::Encrypter;
use self::php::PhpValue;

/// Where the interesting attributes live inside a session record.
#[derive(Debug, Clone)]
pub struct SessionLayout {
    /// Session cookie name.
    pub cookie_name: String,
    /// Store key prefix.
    pub key_prefix: String,
    /// Attribute holding the user id.
    pub user_id_field: String,
    /// Attribute holding the verification requirement.
    pub requires_verification_field: String,
    /// Attribute holding the verified flag.
    pub verified_field: String,
}

impl From<&AuthConfig> for SessionLayout {
    fn from(config: &AuthConfig) -> Self {
        Self {
            cookie_name: config.session_cookie_name.clone(),
            key_prefix: config.session_key_prefix.clone(),
            user_id_field: config.session_user_id_field.clone(),
            requires_verification_field: config.session_requires_verification_field.clone(),
            verified_field: config.session_verified_field.clone(),
        }
    }
}

/// Attributes extracted from a stored session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// CSRF token (`_token`).
    pub csrf: Option<Vec<u8>>,
    /// Authenticated user, absent for guest sessions.
    pub user_id: Option<u64>,
    /// Verification requirement; absent means not required.
    pub requires_verification: bool,
    /// Verified flag; absent means not verified.
    pub verified: bool,
}

impl SessionRecord {
    /// Decodes a stored record. The record is a serialized string holding
    /// the serialized attribute array; a bare array is also accepted.
    pub fn parse(raw: &[u8], layout: &SessionLayout) -> Result<Self, AuthError> {
        let outer = php::unserialize(raw)?;
        let attributes = match outer.as_bytes() {
            Some(inner) => php::unserialize(inner)?,
            None => outer,
        };

        if !matches!(attributes, PhpValue::Array(_)) {
            return Err(AuthError::Malformed(
                "session record is not an attribute array".to_string(),
            ));
        }

        let flag = |field: &str| {
            attributes
                .get(field)
                .and_then(PhpValue::as_bool)
                .unwrap_or(false)
        };

        Ok(Self {
            csrf: attributes
                .get("_token")
                .and_then(PhpValue::as_bytes)
                .map(<[u8]>::to_vec),
            user_id: attributes
                .get(&layout.user_id_field)
                .and_then(PhpValue::as_u64),
            requires_verification: flag(&layout.requires_verification_field),
            verified: flag(&layout.verified_field),
        })
    }
}

/// Verifies the encrypted session cookie plus `csrf` parameter.
#[derive(Debug)]
pub struct LaravelSessionVerifier {
    encrypter: Encrypter,
    store: Arc<dyn SessionStore>,
    layout: SessionLayout,
}

impl LaravelSessionVerifier {
    /// Creates a verifier reading records from `store`.
    pub fn new(encrypter: Encrypter, store: Arc<dyn SessionStore>, layout: SessionLayout) -> Self {
        Self {
            encrypter,
            store,
            layout,
        }
    }

    /// Creates a verifier from configuration.
    pub fn from_config(config: &AuthConfig, store: Arc<dyn SessionStore>) -> AppResult<Self> {
        Ok(Self::new(
            Encrypter::from_app_key(&config.app_key)?,
            store,
            SessionLayout::from(config),
        ))
    }

    /// Derives the store key from the cookie value.
    fn store_key(&self, cookie: &str) -> Result<String, AuthError> {
        let plaintext = self.encrypter.decrypt_cookie(cookie)?;
        let session_id = self
            .encrypter
            .strip_cookie_prefix(&self.layout.cookie_name, &plaintext)?;
        let session_id = std::str::from_utf8(session_id)
            .map_err(|_| AuthError::Malformed("session id is not UTF-8".to_string()))?;
        Ok(format!("{}{}", self.layout.key_prefix, session_id))
    }
}

#[async_trait]
impl SessionVerifier for LaravelSessionVerifier {
    fn name(&self) -> &'static str {
        "laravel_session"
    }

    async fn verify(&self, request: &HandshakeRequest) -> Result<Option<UserSession>, AuthError> {
        let Some(cookie) = request.cookie(&self.layout.cookie_name) else {
            return Ok(None);
        };

        let key = self.store_key(&cookie)?;

        let Some(raw) = self.store.get(&key).await? else {
            debug!(key = %key, "Session record not found");
            return Ok(None);
        };

        let record = SessionRecord::parse(&raw, &self.layout)?;

        let Some(user_id) = record.user_id else {
            debug!(key = %key, "Session has no authenticated user");
            return Ok(None);
        };

        let csrf = request
            .query_param("csrf")
            .filter(|csrf| !csrf.is_empty())
            .ok_or(AuthError::Csrf("missing csrf parameter"))?;
        let stored = record
            .csrf
            .as_deref()
            .ok_or(AuthError::Csrf("session has no csrf token"))?;
        if !constant_time_eq(stored, csrf.as_bytes()) {
            return Err(AuthError::Csrf("csrf token mismatch"));
        }

        Ok(Some(UserSession {
            key,
            user_id,
            scopes: HashSet::from([FULL_ACCESS_SCOPE.to_string()]),
            requires_verification: record.requires_verification,
            verified: record.verified,
            ip: request.ip.clone(),
        }))
    }
}


#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use relay_cache::MemorySessionStore;

    use super::test_support::*;
    use super::*;

    const USER_FIELD: &str = "login_web_59ba36addc2b2f9401580f014c7f58ea4e30989d";

    fn layout() -> SessionLayout {
        SessionLayout {
            cookie_name: "osu_session".to_string(),
            key_prefix: "osu-next:".to_string(),
            user_id_field: USER_FIELD.to_string(),
            requires_verification_field: "requires_verification".to_string(),
            verified_field: "verified".to_string(),
        }
    }

    fn verifier(store: Arc<MemorySessionStore>) -> LaravelSessionVerifier {
        LaravelSessionVerifier::new(
            Encrypter::from_app_key(&test_app_key()).unwrap(),
            store,
            layout(),
        )
    }

    fn request(cookie: Option<&str>, csrf: Option<&str>) -> HandshakeRequest {
        let mut query = HashMap::new();
        if let Some(csrf) = csrf {
            query.insert("csrf".to_string(), csrf.to_string());
        }
        HandshakeRequest {
            cookie_header: cookie.map(|c| format!("osu_session={c}")),
            query,
            ip: Some("10.0.0.1".to_string()),
            ..Default::default()
        }
    }

    fn store_with_user() -> Arc<MemorySessionStore> {
        let store = Arc::new(MemorySessionStore::new());
        store.insert(
            "osu-next:sess1",
            session_record(&[
                ("_token", &php_string("csrf-token")),
                (USER_FIELD, "i:42;"),
                ("requires_verification", "b:1;"),
                ("verified", "b:0;"),
            ]),
        );
        store
    }

    #[tokio::test]
    async fn test_valid_session() {
        let cookie = encrypt_cookie(&TEST_KEY, b"sess1");
        let session = verifier(store_with_user())
            .verify(&request(Some(&cookie), Some("csrf-token")))
            .await
            .unwrap()
            .expect("session");

        assert_eq!(session.user_id, 42);
        assert_eq!(session.key, "osu-next:sess1");
        assert!(session.has_scope("anything"));
        assert!(session.requires_verification);
        assert!(!session.verified);
        assert_eq!(session.ip.as_deref(), Some("10.0.0.1"));
    }

    #[tokio::test]
    async fn test_prefixed_cookie_value() {
        let encrypter = Encrypter::from_app_key(&test_app_key()).unwrap();
        let plaintext = format!("{}sess1", encrypter.cookie_prefix("osu_session").unwrap());
        let cookie = encrypt_cookie(&TEST_KEY, plaintext.as_bytes());

        let session = verifier(store_with_user())
            .verify(&request(Some(&cookie), Some("csrf-token")))
            .await
            .unwrap()
            .expect("session");
        assert_eq!(session.key, "osu-next:sess1");
    }

    #[tokio::test]
    async fn test_no_cookie_is_no_session() {
        let result = verifier(store_with_user())
            .verify(&request(None, Some("csrf-token")))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_unknown_or_guest_session_is_no_session() {
        let store = store_with_user();
        store.insert(
            "osu-next:guest",
            session_record(&[("_token", &php_string("csrf-token"))]),
        );

        let missing = encrypt_cookie(&TEST_KEY, b"nope");
        let guest = encrypt_cookie(&TEST_KEY, b"guest");
        let verifier = verifier(store);

        assert!(verifier
            .verify(&request(Some(&missing), Some("csrf-token")))
            .await
            .unwrap()
            .is_none());
        assert!(verifier
            .verify(&request(Some(&guest), Some("csrf-token")))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_csrf_is_required_and_exact() {
        let cookie = encrypt_cookie(&TEST_KEY, b"sess1");
        let verifier = verifier(store_with_user());

        for csrf in [None, Some(""), Some("csrf-tokeN"), Some("csrf-token ")] {
            let err = verifier
                .verify(&request(Some(&cookie), csrf))
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::Csrf(_)), "csrf {csrf:?} gave {err:?}");
        }
    }

    #[tokio::test]
    async fn test_tampered_cookie_is_hard_failure() {
        let cookie = encrypt_cookie(&[1u8; 32], b"sess1");
        let err = verifier(store_with_user())
            .verify(&request(Some(&cookie), Some("csrf-token")))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Integrity(_)));
    }

    #[test]
    fn test_record_flags_default_off() {
        let raw = session_record(&[(USER_FIELD, "s:2:\"15\";")]);
        let record = SessionRecord::parse(&raw, &layout()).unwrap();
        assert_eq!(record.user_id, Some(15));
        assert_eq!(record.csrf, None);
        assert!(!record.requires_verification);
        assert!(!record.verified);
    }

    #[test]
    fn test_record_must_be_array() {
        let raw = b"s:4:\"i:1;\";";
        assert!(matches!(
            SessionRecord::parse(raw, &layout()),
            Err(AuthError::Malformed(_))
        ));
    }
}
