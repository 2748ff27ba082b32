//! Route definitions.
//!
//! The websocket endpoint lives at the root path, where existing clients
//! already connect.

use axum::Router;
use axum::routing::get;

use crate::handlers;
use crate::state::AppState;

/// Build the router with every route.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::ws::ws_handler))
        .route("/health", get(handlers::health::health))
        .with_state(state)
}
