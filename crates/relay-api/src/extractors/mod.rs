//! Custom Axum extractors.

pub mod handshake;

pub use handshake::Handshake;
