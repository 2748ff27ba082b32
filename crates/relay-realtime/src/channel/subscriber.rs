//! The broker's view of a connection.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::message::envelope::MessageEnvelope;

/// Unique connection identifier
pub type ConnectionId = Uuid;

/// Something that can be registered on topics and receive their messages.
#[async_trait]
pub trait Subscriber: Send + Sync + 'static {
    /// Identity used for set membership.
    fn id(&self) -> ConnectionId;

    /// Inactive subscribers are never registered.
    fn is_active(&self) -> bool;

    /// Handles one message published on `topic`. `raw` is the payload as
    /// published; `envelope` is its decoded form.
    async fn deliver(self: Arc<Self>, topic: &str, raw: Arc<str>, envelope: Arc<MessageEnvelope>);
}
