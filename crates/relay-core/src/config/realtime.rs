//! Connection and delivery configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-connection behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Interval between liveness pings in seconds.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_seconds: u64,
    /// Outbound frame buffer per connection.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer_size: usize,
    /// Queue between the pub/sub transport and the broker pump.
    #[serde(default = "default_transport_buffer")]
    pub transport_buffer_size: usize,
    /// Drop application events whose `data.source_user_id` is the
    /// receiving user.
    #[serde(default)]
    pub suppress_self_events: bool,
}

impl RealtimeConfig {
    /// Heartbeat interval as a `Duration`.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_seconds)
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_seconds: default_heartbeat_interval(),
            outbound_buffer_size: default_outbound_buffer(),
            transport_buffer_size: default_transport_buffer(),
            suppress_self_events: false,
        }
    }
}

fn default_heartbeat_interval() -> u64 {
    20
}

fn default_outbound_buffer() -> usize {
    256
}

fn default_transport_buffer() -> usize {
    1024
}
