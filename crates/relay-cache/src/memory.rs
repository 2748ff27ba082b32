//! In-memory session store.

use async_trait::async_trait;
use dashmap::DashMap;

use relay_core::result::AppResult;
use relay_core::traits::SessionStore;

/// Session store backed by a concurrent map.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: DashMap<String, Vec<u8>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a record.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Removes a record.
    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }
}
