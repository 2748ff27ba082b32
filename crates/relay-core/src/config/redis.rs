//! Redis endpoint configuration.

use serde::{Deserialize, Serialize};

/// Redis endpoints. The session store and the broadcast transport may live
/// on different servers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis holding web sessions.
    #[serde(default = "default_redis_url")]
    pub session_url: String,
    /// Redis carrying published notification events.
    #[serde(default = "default_redis_url")]
    pub broadcast_url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            session_url: default_redis_url(),
            broadcast_url: default_redis_url(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}
