//! `Handshake` extractor: the credential-bearing parts of an upgrade
//! request.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts, Query};
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum_extra::headers::{HeaderMapExt, UserAgent};

use relay_auth::HandshakeRequest;

/// Credentials and client details of a websocket handshake.
///
/// Never rejects: missing pieces are left empty and judged by the
/// verifiers.
#[derive(Debug, Clone, Default)]
pub struct Handshake {
    /// What the verifiers see.
    pub request: HandshakeRequest,
    /// Client user agent, for logging.
    pub user_agent: Option<String>,
}

impl Handshake {
    /// Extracts the handshake from request parts.
    ///
    /// The client address is the first `X-Forwarded-For` entry when the
    /// relay sits behind a proxy, else the socket peer.
    pub fn from_parts(parts: &Parts) -> Self {
        let authorization = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let cookies: Vec<&str> = parts
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        let cookie_header = (!cookies.is_empty()).then(|| cookies.join("; "));

        let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map(|Query(query)| query)
            .unwrap_or_default();

        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        let user_agent = parts
            .headers
            .typed_get::<UserAgent>()
            .map(|ua| ua.as_str().to_string());

        Self {
            request: HandshakeRequest {
                authorization,
                cookie_header,
                query,
                ip: forwarded.or(peer),
            },
            user_agent,
        }
    }
}

impl<S> FromRequestParts<S> for Handshake
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}
