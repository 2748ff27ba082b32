//! Key-value store holding serialized web sessions.

use async_trait::async_trait;

use crate::result::AppResult;

/// Raw access to serialized session records.
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug + 'static {
    /// Returns the raw record bytes, or `None` if the key does not exist.
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>>;
}
