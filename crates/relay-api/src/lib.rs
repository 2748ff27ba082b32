//! # relay-api
//!
//! Websocket endpoint for the notification relay built on Axum.
//!
//! The upgrade handler authenticates the handshake, hands the accepted
//! socket to a booted connection, and pumps frames in both directions
//! until either side closes.

pub mod app;
pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod router;
pub mod state;

pub use app::build_app;
pub use state::AppState;
