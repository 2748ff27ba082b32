//! Control channels and the closed set of control messages they carry.

use serde::Deserialize;
use thiserror::Error;

use relay_core::traits::NotificationOption;
use relay_core::types::topic;

use super::envelope::MessageEnvelope;

/// What a topic means to a particular connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// `user_subscription:<id>`: dynamic subscribe/unsubscribe and
    /// preference changes.
    SubscriptionControl,
    /// `user_session:<id>`: logout and verification.
    SessionControl,
    /// Anything else.
    Application,
}

/// A user's control topic names, resolved once per connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlChannels {
    subscription: String,
    session: String,
}

impl ControlChannels {
    /// Control topics for `user_id`.
    pub fn for_user(user_id: u64) -> Self {
        Self {
            subscription: topic::user_subscription(user_id),
            session: topic::user_session(user_id),
        }
    }

    /// Classifies an inbound topic.
    pub fn classify(&self, topic: &str) -> ChannelKind {
        if topic == self.subscription {
            ChannelKind::SubscriptionControl
        } else if topic == self.session {
            ChannelKind::SessionControl
        } else {
            ChannelKind::Application
        }
    }
}

/// A control payload that could not be decoded.
#[derive(Debug, Error)]
#[error("invalid {event} payload: {source}")]
pub struct ControlError {
    event: String,
    #[source]
    source: serde_json::Error,
}

fn decode<T: for<'de> Deserialize<'de>>(envelope: &MessageEnvelope) -> Result<T, ControlError> {
    serde_json::from_value(envelope.data.clone()).map_err(|source| ControlError {
        event: envelope.event.clone(),
        source,
    })
}

/// Messages on the session-control channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionControl {
    /// Sessions identified by `keys` were logged out.
    Logout {
        /// Invalidated session keys.
        keys: Vec<String>,
    },
    /// The account's verification requirement changed.
    VerificationRequirementChange {
        /// New requirement.
        requires_verification: bool,
    },
    /// The session identified by `key` completed verification.
    Verified {
        /// Verified session key.
        key: String,
    },
}

#[derive(Deserialize)]
struct LogoutData {
    #[serde(default)]
    keys: Vec<String>,
}

#[derive(Deserialize)]
struct VerificationRequirementData {
    requires_verification: bool,
}

#[derive(Deserialize)]
struct VerifiedData {
    key: String,
}

impl SessionControl {
    /// Decodes a session-control message. Unknown events yield `Ok(None)`.
    pub fn parse(envelope: &MessageEnvelope) -> Result<Option<Self>, ControlError> {
        let message = match envelope.event.as_str() {
            "logout" => {
                let data: LogoutData = decode(envelope)?;
                Self::Logout { keys: data.keys }
            }
            "verification_requirement_change" => {
                let data: VerificationRequirementData = decode(envelope)?;
                Self::VerificationRequirementChange {
                    requires_verification: data.requires_verification,
                }
            }
            "verified" => {
                let data: VerifiedData = decode(envelope)?;
                Self::Verified { key: data.key }
            }
            _ => return Ok(None),
        };
        Ok(Some(message))
    }
}

/// Messages on the subscription-control channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionControl {
    /// A per-type delivery option changed.
    NotificationOptionChange {
        /// Notification type name.
        name: String,
        /// New option.
        option: NotificationOption,
    },
    /// Start receiving the given topics.
    Add(Vec<String>),
    /// Stop receiving the given topics.
    Remove(Vec<String>),
}

#[derive(Deserialize)]
struct OptionChangeData {
    name: String,
    #[serde(default)]
    details: NotificationOption,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for Vec<String> {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(channel) => vec![channel],
            OneOrMany::Many(channels) => channels,
        }
    }
}

#[derive(Deserialize)]
struct ChannelChangeData {
    channel: OneOrMany,
    #[serde(default)]
    action: Option<String>,
}

impl SubscriptionControl {
    /// Decodes a subscription-control message.
    ///
    /// Anything other than an option change is a channel change; it removes
    /// when either the event or `data.action` is `remove` and adds
    /// otherwise.
    pub fn parse(envelope: &MessageEnvelope) -> Result<Self, ControlError> {
        if envelope.event == "notification_option.change" {
            let data: OptionChangeData = decode(envelope)?;
            return Ok(Self::NotificationOptionChange {
                name: data.name,
                option: data.details,
            });
        }

        let data: ChannelChangeData = decode(envelope)?;
        let remove = envelope.event == "remove" || data.action.as_deref() == Some("remove");
        let channels = data.channel.into();
        Ok(if remove {
            Self::Remove(channels)
        } else {
            Self::Add(channels)
        })
    }
}
