//! # relay-cache
//!
//! Backends for the web-session store read by the cookie verifier:
//!
//! - **redis**: the production store shared with the web application
//! - **memory**: an in-process map for single-node runs and tests

pub mod memory;
#[cfg(feature = "redis-backend")]
pub mod redis;

pub use memory::MemorySessionStore;
#[cfg(feature = "redis-backend")]
pub use self::redis::{RedisClient, RedisSessionStore};
