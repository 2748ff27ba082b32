//! A single authenticated client connection.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use relay_core::traits::InterestDirectory;
use relay_core::types::{UserSession, topic};

use super::heartbeat::run_heartbeat;
use super::state::{AtomicConnectionState, ConnectionState};
use crate::channel::broker::SubscriptionBroker;
use crate::channel::subscriber::{ConnectionId, Subscriber};
use crate::message::control::{ChannelKind, ControlChannels, SessionControl, SubscriptionControl};
use crate::message::envelope::MessageEnvelope;
use crate::message::frame::{LOGOUT_FRAME, OutboundFrame, VERIFIED_FRAME};
use crate::metrics::RelayMetrics;
use crate::notification::filter::{DeliveryPolicy, Recipient};
use crate::notification::preferences::NotificationPreferences;

/// Shared collaborators handed to every connection.
#[derive(Clone)]
pub struct ConnectionContext {
    /// Topic membership.
    pub broker: Arc<SubscriptionBroker>,
    /// Interest and preference lookups.
    pub directory: Arc<dyn InterestDirectory>,
    /// Counters.
    pub metrics: Arc<RelayMetrics>,
    /// Liveness ping period.
    pub heartbeat_interval: Duration,
    /// Application-event filter settings.
    pub policy: DeliveryPolicy,
}

impl std::fmt::Debug for ConnectionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionContext")
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Connection state machine.
///
/// Frames for the client are queued on `outbound`; the socket writer owns
/// the receiving end and stops when the cancellation token fires.
pub struct UserConnection {
    id: ConnectionId,
    session: UserSession,
    requires_verification: AtomicBool,
    verified: AtomicBool,
    state: AtomicConnectionState,
    /// Set when a ping is answered; starts `true` so the first tick pings.
    heartbeat_acked: AtomicBool,
    channels: ControlChannels,
    preferences: NotificationPreferences,
    outbound: mpsc::Sender<OutboundFrame>,
    context: ConnectionContext,
    cancel: CancellationToken,
    connected_at: DateTime<Utc>,
}

impl std::fmt::Debug for UserConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserConnection")
            .field("id", &self.id)
            .field("user_id", &self.session.user_id)
            .field("state", &self.state.load())
            .finish_non_exhaustive()
    }
}

impl UserConnection {
    /// Creates a connection in the `Booting` state.
    pub fn new(
        session: UserSession,
        context: ConnectionContext,
        outbound: mpsc::Sender<OutboundFrame>,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        context.metrics.connection_opened();
        Arc::new(Self {
            id: Uuid::new_v4(),
            requires_verification: AtomicBool::new(session.requires_verification),
            verified: AtomicBool::new(session.verified),
            channels: ControlChannels::for_user(session.user_id),
            session,
            state: AtomicConnectionState::new(),
            heartbeat_acked: AtomicBool::new(true),
            preferences: NotificationPreferences::new(),
            outbound,
            context,
            cancel,
            connected_at: Utc::now(),
        })
    }

    /// Connection id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Authenticated user.
    pub fn user_id(&self) -> u64 {
        self.session.user_id
    }

    /// The session with its current verification flags.
    pub fn session(&self) -> UserSession {
        UserSession {
            requires_verification: self.requires_verification.load(Ordering::SeqCst),
            verified: self.verified.load(Ordering::SeqCst),
            ..self.session.clone()
        }
    }

    /// Whether application events may currently be delivered.
    pub fn can_receive_events(&self) -> bool {
        !self.requires_verification.load(Ordering::SeqCst) || self.verified.load(Ordering::SeqCst)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state.load()
    }

    /// Whether the connection is receiving events.
    pub fn is_active(&self) -> bool {
        self.state.load() == ConnectionState::Active
    }

    /// Token cancelled when the connection closes.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Push preferences of the user.
    pub fn preferences(&self) -> &NotificationPreferences {
        &self.preferences
    }

    /// Activates the connection, starts the heartbeat, loads the interest
    /// set and preferences, and registers with the broker if the
    /// connection is still active afterwards.
    pub async fn boot(self: &Arc<Self>) {
        if !self.state.activate() {
            debug!(conn_id = %self.id, "Boot skipped, connection no longer booting");
            return;
        }

        tokio::spawn(run_heartbeat(
            Arc::downgrade(self),
            self.context.heartbeat_interval,
            self.cancel.clone(),
        ));

        let (topics, ()) = tokio::join!(self.interest_set(), self.load_preferences());

        if !self.is_active() {
            debug!(conn_id = %self.id, "Connection closed during boot, not subscribing");
            return;
        }

        debug!(conn_id = %self.id, topics = topics.len(), "Registering interest set");
        self.context
            .broker
            .subscribe(&topics, self.clone() as Arc<dyn Subscriber>)
            .await;

        info!(
            conn_id = %self.id,
            user_id = self.session.user_id,
            ip = self.session.ip.as_deref().unwrap_or("-"),
            "Connection booted"
        );
    }

    /// Records a ping acknowledgment.
    pub fn ack_heartbeat(&self) {
        self.heartbeat_acked.store(true, Ordering::SeqCst);
    }

    /// Sends a new ping if the previous one was acknowledged. Returns
    /// `false` when it was not, i.e. the peer should be considered gone.
    pub(crate) fn send_ping(&self) -> bool {
        if !self.heartbeat_acked.swap(false, Ordering::SeqCst) {
            return false;
        }
        self.send(OutboundFrame::Ping);
        true
    }

    /// Tears the connection down. Idempotent.
    pub async fn close(&self) {
        if !self.state.close() {
            return;
        }

        self.cancel.cancel();
        self.context.broker.unsubscribe(None, self.id).await;
        self.context.metrics.connection_closed();

        info!(
            conn_id = %self.id,
            user_id = self.session.user_id,
            duration_secs = (Utc::now() - self.connected_at).num_seconds(),
            "Connection closed"
        );
    }

    /// Queues a frame. Failures are logged and otherwise ignored.
    fn send(&self, frame: OutboundFrame) -> bool {
        match self.outbound.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(conn_id = %self.id, "Outbound buffer full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(conn_id = %self.id, "Outbound channel closed");
                false
            }
        }
    }

    /// Directory topics plus the fixed per-user topics. A directory failure
    /// leaves only the fixed topics.
    async fn interest_set(&self) -> Vec<String> {
        let user_id = self.session.user_id;
        match self.context.directory.topics_for(user_id).await {
            Ok(topics) => topics,
            Err(e) => {
                warn!(conn_id = %self.id, user_id, error = %e, "Interest lookup failed, using fixed topics");
                topic::fixed_topics(user_id)
            }
        }
    }

    async fn load_preferences(&self) {
        match self
            .context
            .directory
            .notification_options(self.session.user_id)
            .await
        {
            Ok(options) => self.preferences.replace_all(options),
            Err(e) => {
                warn!(conn_id = %self.id, error = %e, "Preference lookup failed, delivering everything");
                self.preferences.replace_all(HashMap::new());
            }
        }
    }

    async fn handle_subscription_control(self: &Arc<Self>, envelope: &MessageEnvelope) {
        let control = match SubscriptionControl::parse(envelope) {
            Ok(control) => control,
            Err(e) => {
                debug!(conn_id = %self.id, error = %e, "Ignoring subscription control message");
                return;
            }
        };

        match control {
            SubscriptionControl::NotificationOptionChange { name, option } => {
                debug!(conn_id = %self.id, name = %name, push = option.push, "Notification option changed");
                self.preferences.set(name, option);
            }
            SubscriptionControl::Add(topics) => {
                self.context
                    .broker
                    .subscribe(&topics, self.clone() as Arc<dyn Subscriber>)
                    .await;
            }
            SubscriptionControl::Remove(topics) => {
                self.context.broker.unsubscribe(Some(&topics), self.id).await;
            }
        }
    }

    async fn handle_session_control(&self, envelope: &MessageEnvelope) {
        let control = match SessionControl::parse(envelope) {
            Ok(Some(control)) => control,
            Ok(None) => {
                debug!(conn_id = %self.id, event = %envelope.event, "Ignoring session event");
                return;
            }
            Err(e) => {
                debug!(conn_id = %self.id, error = %e, "Ignoring session control message");
                return;
            }
        };

        match control {
            SessionControl::Logout { keys } => {
                if keys.iter().any(|key| *key == self.session.key) {
                    info!(conn_id = %self.id, user_id = self.session.user_id, "Session logged out");
                    self.send(OutboundFrame::text(LOGOUT_FRAME));
                    self.close().await;
                }
            }
            SessionControl::VerificationRequirementChange {
                requires_verification,
            } => {
                self.requires_verification
                    .store(requires_verification, Ordering::SeqCst);
            }
            SessionControl::Verified { key } => {
                if key == self.session.key {
                    self.verified.store(true, Ordering::SeqCst);
                    self.send(OutboundFrame::text(VERIFIED_FRAME));
                }
            }
        }
    }

    fn forward_application(&self, topic: &str, raw: Arc<str>, envelope: &MessageEnvelope) {
        let recipient = Recipient {
            user_id: self.session.user_id,
            can_receive_events: self.can_receive_events(),
            preferences: &self.preferences,
        };

        match self.context.policy.check(recipient, envelope) {
            Ok(()) => {
                self.send(OutboundFrame::Text(raw));
            }
            Err(reason) => {
                debug!(conn_id = %self.id, topic = %topic, reason = ?reason, "Event suppressed");
                self.context.metrics.record_suppressed();
            }
        }
    }
}

#[async_trait]
impl Subscriber for UserConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn is_active(&self) -> bool {
        UserConnection::is_active(self)
    }

    async fn deliver(self: Arc<Self>, topic: &str, raw: Arc<str>, envelope: Arc<MessageEnvelope>) {
        if !self.is_active() {
            return;
        }

        match self.channels.classify(topic) {
            ChannelKind::SubscriptionControl => self.handle_subscription_control(&envelope).await,
            ChannelKind::SessionControl => self.handle_session_control(&envelope).await,
            ChannelKind::Application => self.forward_application(topic, raw, &envelope),
        }
    }
}
