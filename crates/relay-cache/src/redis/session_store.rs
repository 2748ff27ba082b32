//! Session records shared with the web application.

use async_trait::async_trait;
use redis::AsyncCommands;

use relay_core::error::{AppError, ErrorKind};
use relay_core::result::AppResult;
use relay_core::traits::SessionStore;

use super::client::RedisClient;

/// Reads raw session records with `GET`.
#[derive(Debug, Clone)]
pub struct RedisSessionStore {
    client: RedisClient,
}

impl RedisSessionStore {
    /// Wraps a connected client.
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let mut conn = self.client.conn_mut();
        conn.get::<_, Option<Vec<u8>>>(key)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Cache, "Redis GET failed", e))
    }
}
