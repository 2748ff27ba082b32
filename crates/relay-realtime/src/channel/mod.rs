//! Topic membership and fan-out.

pub mod broker;
pub mod subscriber;
pub mod table;

pub use broker::SubscriptionBroker;
pub use subscriber::{ConnectionId, Subscriber};
pub use table::TopicTable;
