//! Redis session store.

pub mod client;
pub mod session_store;

pub use client::RedisClient;
pub use session_store::RedisSessionStore;
