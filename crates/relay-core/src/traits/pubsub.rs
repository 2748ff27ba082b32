//! External publish/subscribe transport.

use async_trait::async_trait;

use crate::result::AppResult;

/// A payload received on a transport topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    /// Topic the payload was published on.
    pub topic: String,
    /// JSON text as published.
    pub payload: String,
}

/// Subscription side of the transport. Inbound messages are delivered
/// separately as a stream of [`BrokerMessage`].
#[async_trait]
pub trait PubSubTransport: Send + Sync + std::fmt::Debug + 'static {
    /// Start receiving the given topics.
    async fn subscribe(&self, topics: &[String]) -> AppResult<()>;

    /// Stop receiving the given topics.
    async fn unsubscribe(&self, topics: &[String]) -> AppResult<()>;
}
