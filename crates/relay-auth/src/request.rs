//! Credential-bearing parts of a websocket handshake.

use std::collections::HashMap;

use percent_encoding::percent_decode_str;

/// The pieces of an upgrade request the verifiers look at.
#[derive(Debug, Clone, Default)]
pub struct HandshakeRequest {
    /// Raw `Authorization` header.
    pub authorization: Option<String>,
    /// Raw `Cookie` header.
    pub cookie_header: Option<String>,
    /// Decoded query parameters.
    pub query: HashMap<String, String>,
    /// Client address.
    pub ip: Option<String>,
}

impl HandshakeRequest {
    /// Bearer token from the `Authorization` header, or from the
    /// `access_token` query parameter when no header is present.
    ///
    /// A header that is not of the form `Bearer <token>` yields no token.
    pub fn bearer_token(&self) -> Option<&str> {
        match &self.authorization {
            Some(header) => header
                .strip_prefix("Bearer ")
                .filter(|token| !token.is_empty()),
            None => self.query_param("access_token"),
        }
    }

    /// A query parameter by name.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// A percent-decoded cookie value by name.
    pub fn cookie(&self, name: &str) -> Option<String> {
        let header = self.cookie_header.as_deref()?;
        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| key.trim() == name)
            .map(|(_, value)| {
                let value = value.trim().trim_matches('"');
                percent_decode_str(value).decode_utf8_lossy().into_owned()
            })
    }

    /// Whether any credential was presented at all.
    pub fn has_credentials(&self, cookie_name: &str) -> bool {
        self.authorization.is_some()
            || self.query.contains_key("access_token")
            || self.cookie(cookie_name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_query(pairs: &[(&str, &str)]) -> HandshakeRequest {
        HandshakeRequest {
            query: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_bearer_from_header() {
        let request = HandshakeRequest {
            authorization: Some("Bearer abc.def.ghi".to_string()),
            ..with_query(&[("access_token", "ignored")])
        };
        assert_eq!(request.bearer_token(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_non_bearer_header_yields_nothing() {
        let request = HandshakeRequest {
            authorization: Some("Basic dXNlcjpwYXNz".to_string()),
            ..with_query(&[("access_token", "ignored")])
        };
        assert_eq!(request.bearer_token(), None);
    }

    #[test]
    fn test_bearer_from_query() {
        let request = with_query(&[("access_token", "tok")]);
        assert_eq!(request.bearer_token(), Some("tok"));
    }

    #[test]
    fn test_cookie_is_percent_decoded() {
        let request = HandshakeRequest {
            cookie_header: Some("locale=en; osu_session=eyJpdiI6%3D%3D; other=1".to_string()),
            ..Default::default()
        };
        assert_eq!(request.cookie("osu_session").as_deref(), Some("eyJpdiI6=="));
        assert_eq!(request.cookie("missing"), None);
    }

    #[test]
    fn test_has_credentials() {
        assert!(!HandshakeRequest::default().has_credentials("osu_session"));
        assert!(with_query(&[("access_token", "x")]).has_credentials("osu_session"));
        let request = HandshakeRequest {
            cookie_header: Some("osu_session=x".to_string()),
            ..Default::default()
        };
        assert!(request.has_credentials("osu_session"));
        assert!(!request.has_credentials("other_session"));
    }
}
