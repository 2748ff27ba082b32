//! Per-connection delivery filtering.

pub mod filter;
pub mod preferences;

pub use filter::{DeliveryPolicy, Recipient, Suppression};
pub use preferences::NotificationPreferences;
