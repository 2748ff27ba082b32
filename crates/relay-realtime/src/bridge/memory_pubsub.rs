//! In-memory pub/sub for single-process runs and tests.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use relay_core::result::AppResult;
use relay_core::traits::{BrokerMessage, PubSubTransport};

/// A subscribe or unsubscribe issued to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    /// `subscribe(topics)`
    Subscribe(Vec<String>),
    /// `unsubscribe(topics)`
    Unsubscribe(Vec<String>),
}

/// In-memory pub/sub implementation.
#[derive(Debug)]
pub struct MemoryPubSub {
    /// Topics currently subscribed
    subscribed: Mutex<HashSet<String>>,
    /// Every call issued, in order
    calls: Mutex<Vec<TransportCall>>,
    /// Feeds the broker
    sender: mpsc::Sender<BrokerMessage>,
}

impl MemoryPubSub {
    /// Create a new in-memory pub/sub and the receiver the broker reads.
    pub fn new(buffer_size: usize) -> (Self, mpsc::Receiver<BrokerMessage>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let transport = Self {
            subscribed: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            sender,
        };
        (transport, receiver)
    }

    /// Publishes `payload` on `topic`. Returns `false` when nobody is
    /// subscribed to the topic or the broker has gone away.
    pub async fn publish(&self, topic: &str, payload: &str) -> bool {
        if !self.subscribed.lock().await.contains(topic) {
            return false;
        }
        self.sender
            .send(BrokerMessage {
                topic: topic.to_string(),
                payload: payload.to_string(),
            })
            .await
            .is_ok()
    }

    /// Calls issued so far.
    pub async fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().await.clone()
    }

    /// Whether `topic` is currently subscribed.
    pub async fn is_subscribed(&self, topic: &str) -> bool {
        self.subscribed.lock().await.contains(topic)
    }
}

#[async_trait]
impl PubSubTransport for MemoryPubSub {
    async fn subscribe(&self, topics: &[String]) -> AppResult<()> {
        self.calls
            .lock()
            .await
            .push(TransportCall::Subscribe(topics.to_vec()));
        self.subscribed.lock().await.extend(topics.iter().cloned());
        Ok(())
    }

    async fn unsubscribe(&self, topics: &[String]) -> AppResult<()> {
        self.calls
            .lock()
            .await
            .push(TransportCall::Unsubscribe(topics.to_vec()));
        let mut subscribed = self.subscribed.lock().await;
        for topic in topics {
            subscribed.remove(topic);
        }
        Ok(())
    }
}
