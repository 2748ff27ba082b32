//! Collaborator traits implemented by the storage and transport crates.

pub mod directory;
pub mod pubsub;
pub mod session_store;

pub use directory::{InterestDirectory, NotificationOption, TokenDirectory, TokenRecord};
pub use pubsub::{BrokerMessage, PubSubTransport};
pub use session_store::SessionStore;
