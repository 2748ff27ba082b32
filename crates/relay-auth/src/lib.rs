//! # relay-auth
//!
//! Converts an inbound websocket handshake into a trusted [`UserSession`].
//!
//! ## Modules
//!
//! - `oauth`: RS256 bearer tokens checked against the token directory
//! - `laravel`: encrypted web-session cookies plus CSRF parameter
//! - `resolver`: tries each verifier in order and collapses failures
//!
//! [`UserSession`]: relay_core::types::UserSession

pub mod compare;
pub mod error;
pub mod laravel;
pub mod oauth;
pub mod request;
pub mod resolver;
pub mod verifier;

pub use error::{AuthError, AuthFailure};
pub use laravel::LaravelSessionVerifier;
pub use oauth::OAuthVerifier;
pub use request::HandshakeRequest;
pub use resolver::IdentityResolver;
pub use verifier::SessionVerifier;
