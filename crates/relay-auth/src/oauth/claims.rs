//! Claims carried by OAuth access tokens.

use serde::{Deserialize, Serialize};

/// Payload of a signed access token. Only `jti` is trusted; scopes and
/// ownership are read back from the token directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Token id, the primary key in the token directory.
    pub jti: String,
    /// Subject, the owning user id as a string.
    #[serde(default)]
    pub sub: Option<String>,
    /// Client the token was issued to.
    #[serde(default)]
    pub aud: Option<String>,
    /// Issued-at timestamp (seconds since epoch).
    #[serde(default)]
    pub iat: Option<i64>,
    /// Expiration timestamp (seconds since epoch).
    pub exp: i64,
    /// Scopes as issued.
    #[serde(default)]
    pub scopes: Vec<String>,
}
