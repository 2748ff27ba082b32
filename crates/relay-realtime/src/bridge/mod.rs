//! Publish/subscribe transports feeding the broker.

pub mod memory_pubsub;
pub mod redis_pubsub;

pub use memory_pubsub::MemoryPubSub;
#[cfg(feature = "redis-pubsub")]
pub use redis_pubsub::RedisPubSub;
