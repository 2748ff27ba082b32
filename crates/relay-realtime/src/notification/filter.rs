//! Application-event delivery filter.

use crate::message::envelope::MessageEnvelope;

use super::preferences::NotificationPreferences;

/// Connection-independent delivery settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryPolicy {
    /// Withhold events the user caused themselves.
    pub suppress_self_events: bool,
}

/// Why an application event was withheld.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    /// The session still needs verification.
    Unverified,
    /// `data` is not an object.
    Unstructured,
    /// The event originated from the receiving user.
    SelfEvent,
    /// The user disabled push for this notification type.
    PushDisabled,
}

/// Inputs describing the receiving connection.
#[derive(Debug, Clone, Copy)]
pub struct Recipient<'a> {
    /// Receiving user.
    pub user_id: u64,
    /// Whether the session may receive application events.
    pub can_receive_events: bool,
    /// The user's push preferences.
    pub preferences: &'a NotificationPreferences,
}

impl DeliveryPolicy {
    /// Decides whether `envelope` reaches `recipient`. Checks run in a
    /// fixed order and the first failing check is reported.
    pub fn check(&self, recipient: Recipient<'_>, envelope: &MessageEnvelope) -> Result<(), Suppression> {
        if !recipient.can_receive_events {
            return Err(Suppression::Unverified);
        }

        if envelope.data_object().is_none() {
            return Err(Suppression::Unstructured);
        }

        if self.suppress_self_events && envelope.source_user_id() == Some(recipient.user_id) {
            return Err(Suppression::SelfEvent);
        }

        if let Some(name) = envelope.notification_name() {
            if !recipient.preferences.allows_push(name) {
                return Err(Suppression::PushDisabled);
            }
        }

        Ok(())
    }
}
