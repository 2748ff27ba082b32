//! Broker message envelope, control-message variants and outbound frames.

pub mod control;
pub mod envelope;
pub mod frame;

pub use control::{ChannelKind, ControlChannels, ControlError, SessionControl, SubscriptionControl};
pub use envelope::MessageEnvelope;
pub use frame::OutboundFrame;
