//! JSON response bodies.

use serde::{Deserialize, Serialize};

use relay_realtime::metrics::MetricsSnapshot;

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `"ok"` while serving, `"shutting_down"` once shutdown began.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Topics currently subscribed on the transport.
    pub topics: usize,
    /// Delivery and connection counters.
    pub metrics: MetricsSnapshot,
}
