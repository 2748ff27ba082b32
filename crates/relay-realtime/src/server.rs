//! Top-level relay engine that ties together all subsystems.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use relay_core::config::RealtimeConfig;
use relay_core::traits::{BrokerMessage, InterestDirectory, PubSubTransport};
use relay_core::types::UserSession;

use crate::channel::broker::SubscriptionBroker;
use crate::connection::user_connection::{ConnectionContext, UserConnection};
use crate::message::frame::OutboundFrame;
use crate::metrics::{MetricsSnapshot, RelayMetrics};
use crate::notification::filter::DeliveryPolicy;

/// Central engine creating connections and pumping transport messages.
#[derive(Clone)]
pub struct RelayEngine {
    /// Subscription broker.
    broker: Arc<SubscriptionBroker>,
    /// Metrics collector.
    metrics: Arc<RelayMetrics>,
    /// Collaborators handed to each connection.
    context: ConnectionContext,
    /// Outbound frame buffer per connection.
    outbound_buffer: usize,
    /// Parent of every connection's cancellation token.
    shutdown: CancellationToken,
}

impl std::fmt::Debug for RelayEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayEngine").finish()
    }
}

impl RelayEngine {
    /// Creates a new engine over `transport` and `directory`.
    pub fn new(
        config: &RealtimeConfig,
        transport: Arc<dyn PubSubTransport>,
        directory: Arc<dyn InterestDirectory>,
    ) -> Self {
        let metrics = Arc::new(RelayMetrics::new());
        let broker = Arc::new(SubscriptionBroker::new(transport, metrics.clone()));
        let context = ConnectionContext {
            broker: broker.clone(),
            directory,
            metrics: metrics.clone(),
            heartbeat_interval: config.heartbeat_interval(),
            policy: DeliveryPolicy {
                suppress_self_events: config.suppress_self_events,
            },
        };

        info!(
            heartbeat_secs = config.heartbeat_interval_seconds,
            suppress_self_events = config.suppress_self_events,
            "Relay engine initialized"
        );

        Self {
            broker,
            metrics,
            context,
            outbound_buffer: config.outbound_buffer_size.max(1),
            shutdown: CancellationToken::new(),
        }
    }

    /// Spawns the broker pump reading `messages`.
    pub fn start(&self, messages: mpsc::Receiver<BrokerMessage>) -> JoinHandle<()> {
        tokio::spawn(self.broker.clone().run(messages, self.shutdown.clone()))
    }

    /// Creates a connection for an authenticated session. The caller boots
    /// it and drains the returned receiver into the socket.
    pub fn open(&self, session: UserSession) -> (Arc<UserConnection>, mpsc::Receiver<OutboundFrame>) {
        let (sender, receiver) = mpsc::channel(self.outbound_buffer);
        let connection = UserConnection::new(
            session,
            self.context.clone(),
            sender,
            self.shutdown.child_token(),
        );
        (connection, receiver)
    }

    /// The subscription broker.
    pub fn broker(&self) -> &Arc<SubscriptionBroker> {
        &self.broker
    }

    /// Current metrics.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Whether shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Resolves once shutdown has begun, whether requested or because the
    /// broadcast transport closed.
    pub async fn stopped(&self) {
        self.shutdown.cancelled().await;
    }

    /// Stops the broker pump and signals every connection to close.
    pub fn shutdown(&self) {
        info!("Shutting down relay engine");
        self.shutdown.cancel();
    }
}
