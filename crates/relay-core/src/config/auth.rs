//! Credential verification configuration.

use serde::{Deserialize, Serialize};

/// Settings for both credential paths: encrypted web-session cookies and
/// OAuth bearer tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared application secret, `base64:`-prefixed or raw.
    pub app_key: String,
    /// Name of the encrypted session cookie.
    #[serde(default = "default_cookie_name")]
    pub session_cookie_name: String,
    /// Prefix prepended to the session id to form the store key.
    #[serde(default = "default_key_prefix")]
    pub session_key_prefix: String,
    /// Session attribute holding the authenticated user id.
    #[serde(default = "default_user_id_field")]
    pub session_user_id_field: String,
    /// Session attribute holding the verification requirement flag.
    #[serde(default = "default_requires_verification_field")]
    pub session_requires_verification_field: String,
    /// Session attribute holding the verified flag.
    #[serde(default = "default_verified_field")]
    pub session_verified_field: String,
    /// Path to the PEM public key that signs OAuth access tokens.
    #[serde(default = "default_public_key_path")]
    pub oauth_public_key_path: String,
    /// Feature scope accepted in place of the `*` wildcard.
    #[serde(default = "default_oauth_scope")]
    pub oauth_scope: String,
}

fn default_cookie_name() -> String {
    "osu_session".to_string()
}

fn default_key_prefix() -> String {
    "osu-next:".to_string()
}

fn default_user_id_field() -> String {
    "login_web_59ba36addc2b2f9401580f014c7f58ea4e30989d".to_string()
}

fn default_requires_verification_field() -> String {
    "requires_verification".to_string()
}

fn default_verified_field() -> String {
    "verified".to_string()
}

fn default_public_key_path() -> String {
    "oauth-public.key".to_string()
}

fn default_oauth_scope() -> String {
    "chat.read".to_string()
}
