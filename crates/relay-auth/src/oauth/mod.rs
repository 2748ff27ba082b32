//! OAuth bearer-token verification.

pub mod claims;
pub mod verifier;

pub use claims::AccessTokenClaims;
pub use verifier::OAuthVerifier;
