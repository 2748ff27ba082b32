//! Subscription broker: owns the transport subscription set and fans
//! inbound messages out to registered connections.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use relay_core::traits::{BrokerMessage, PubSubTransport};

use super::subscriber::{ConnectionId, Subscriber};
use super::table::TopicTable;
use crate::message::envelope::MessageEnvelope;
use crate::metrics::RelayMetrics;

/// Table plus the topics whose last transport call failed.
#[derive(Debug, Default)]
struct BrokerState {
    table: TopicTable,
    /// Members registered, transport SUBSCRIBE not yet acknowledged.
    unsubscribed: HashSet<String>,
    /// Members gone, transport UNSUBSCRIBE not yet acknowledged.
    unreleased: HashSet<String>,
}

/// Maps transport topics to local connections.
///
/// Membership changes and the transport calls they trigger happen under
/// one lock. A failed transport call is remembered and retried with the
/// next call in the same direction, so the transport converges back to
/// the table.
pub struct SubscriptionBroker {
    state: Mutex<BrokerState>,
    transport: Arc<dyn PubSubTransport>,
    metrics: Arc<RelayMetrics>,
}

impl std::fmt::Debug for SubscriptionBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionBroker")
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

impl SubscriptionBroker {
    /// Creates a broker over `transport`.
    pub fn new(transport: Arc<dyn PubSubTransport>, metrics: Arc<RelayMetrics>) -> Self {
        Self {
            state: Mutex::new(BrokerState::default()),
            transport,
            metrics,
        }
    }

    /// Registers `subscriber` on `topics`. Inactive subscribers are ignored.
    pub async fn subscribe(&self, topics: &[String], subscriber: Arc<dyn Subscriber>) {
        let mut guard = self.state.lock().await;
        let BrokerState {
            table,
            unsubscribed,
            unreleased,
        } = &mut *guard;

        if !subscriber.is_active() {
            debug!(conn_id = %subscriber.id(), "Skipping subscribe for inactive connection");
            return;
        }

        let mut needed: Vec<String> = topics
            .iter()
            .filter(|topic| table.add(topic, subscriber.clone()))
            .cloned()
            .collect();
        for topic in &needed {
            unreleased.remove(topic);
        }
        for topic in unsubscribed.drain() {
            if table.refcount(&topic) > 0 && !needed.contains(&topic) {
                needed.push(topic);
            }
        }

        if needed.is_empty() {
            return;
        }

        match self.transport.subscribe(&needed).await {
            Ok(()) => {
                self.metrics.record_transport_subscribe(needed.len());
                debug!(topics = needed.len(), "Transport subscribed");
            }
            Err(e) => {
                error!(topics = ?needed, error = %e, "Transport subscribe failed, will retry");
                unsubscribed.extend(needed);
            }
        }
    }

    /// Removes connection `id` from `topics`, or from every topic it is on
    /// when `topics` is `None`.
    pub async fn unsubscribe(&self, topics: Option<&[String]>, id: ConnectionId) {
        let mut guard = self.state.lock().await;
        let BrokerState {
            table,
            unsubscribed,
            unreleased,
        } = &mut *guard;

        let topics = match topics {
            Some(topics) => topics.to_vec(),
            None => table.topics_of(id),
        };

        let mut unneeded: Vec<String> = topics
            .into_iter()
            .filter(|topic| table.remove(topic, id))
            .collect();
        for topic in &unneeded {
            unsubscribed.remove(topic);
        }
        for topic in unreleased.drain() {
            if table.refcount(&topic) == 0 && !unneeded.contains(&topic) {
                unneeded.push(topic);
            }
        }

        if unneeded.is_empty() {
            return;
        }

        match self.transport.unsubscribe(&unneeded).await {
            Ok(()) => {
                self.metrics.record_transport_unsubscribe(unneeded.len());
                debug!(topics = unneeded.len(), "Transport unsubscribed");
            }
            Err(e) => {
                error!(topics = ?unneeded, error = %e, "Transport unsubscribe failed, will retry");
                unreleased.extend(unneeded);
            }
        }
    }

    /// Decodes and fans out one inbound message. Subscribers are
    /// snapshotted before delivery so handlers may subscribe or
    /// unsubscribe.
    pub async fn on_message(&self, message: BrokerMessage) {
        let envelope = match MessageEnvelope::parse(&message.payload) {
            Ok(envelope) => Arc::new(envelope),
            Err(e) => {
                debug!(topic = %message.topic, error = %e, "Dropping undecodable message");
                self.metrics.record_dropped();
                return;
            }
        };

        let subscribers = self.state.lock().await.table.subscribers(&message.topic);
        if subscribers.is_empty() {
            return;
        }

        self.metrics
            .record_delivery(envelope.metric_label(), subscribers.len());

        let raw: Arc<str> = Arc::from(message.payload);
        for subscriber in subscribers {
            subscriber
                .deliver(&message.topic, raw.clone(), envelope.clone())
                .await;
        }
    }

    /// Pumps transport messages into [`Self::on_message`] until shutdown.
    ///
    /// The transport reconnects on its own, so an ended stream means it
    /// gave up; `shutdown` is then cancelled so the process stops instead
    /// of serving connections that can never receive events.
    pub async fn run(
        self: Arc<Self>,
        mut messages: mpsc::Receiver<BrokerMessage>,
        shutdown: CancellationToken,
    ) {
        info!("Subscription broker started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                message = messages.recv() => match message {
                    Some(message) => self.on_message(message).await,
                    None => {
                        error!("Transport message stream closed, shutting down");
                        shutdown.cancel();
                        break;
                    }
                },
            }
        }
        info!("Subscription broker stopped");
    }

    /// Number of topics currently held on the transport.
    pub async fn topic_count(&self) -> usize {
        self.state.lock().await.table.len()
    }

    /// Number of connections registered on `topic`.
    pub async fn refcount(&self, topic: &str) -> usize {
        self.state.lock().await.table.refcount(topic)
    }
}
