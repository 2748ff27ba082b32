//! # relay-realtime
//!
//! Real-time delivery engine for the notification relay. Provides:
//!
//! - A subscription broker mapping transport topics to connections with
//!   reference-counted subscribe/unsubscribe
//! - The per-connection state machine: interest set, delivery filtering,
//!   heartbeat and session-control handling
//! - Per-type notification preferences
//! - Delivery metrics
//! - Redis and in-memory pub/sub bridges

pub mod bridge;
pub mod channel;
pub mod connection;
pub mod message;
pub mod metrics;
pub mod notification;
pub mod server;

pub use channel::broker::SubscriptionBroker;
pub use connection::user_connection::UserConnection;
pub use message::frame::OutboundFrame;
pub use metrics::RelayMetrics;
pub use server::RelayEngine;
