//! Relay delivery metrics.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Engine-level counters.
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Deliveries per event type.
    deliveries: DashMap<String, AtomicU64>,
    /// Broker messages dropped because they could not be decoded.
    dropped: AtomicU64,
    /// Application events withheld by a delivery filter.
    suppressed: AtomicU64,
    /// Connections currently open.
    connections_active: AtomicU64,
    /// Connections ever opened.
    connections_total: AtomicU64,
    /// Topics subscribed on the transport.
    transport_subscribes: AtomicU64,
    /// Topics unsubscribed on the transport.
    transport_unsubscribes: AtomicU64,
}

impl RelayMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts `recipients` deliveries of `event`.
    pub fn record_delivery(&self, event: &str, recipients: usize) {
        if recipients == 0 {
            return;
        }
        if let Some(counter) = self.deliveries.get(event) {
            counter.fetch_add(recipients as u64, Ordering::Relaxed);
            return;
        }
        self.deliveries
            .entry(event.to_string())
            .or_default()
            .fetch_add(recipients as u64, Ordering::Relaxed);
    }

    /// Counts an undecodable broker message.
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a filtered application event.
    pub fn record_suppressed(&self) {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a newly opened connection.
    pub fn connection_opened(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a closed connection.
    pub fn connection_closed(&self) {
        let _ = self
            .connections_active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Counts topics subscribed on the transport.
    pub fn record_transport_subscribe(&self, topics: usize) {
        self.transport_subscribes
            .fetch_add(topics as u64, Ordering::Relaxed);
    }

    /// Counts topics unsubscribed on the transport.
    pub fn record_transport_unsubscribe(&self, topics: usize) {
        self.transport_unsubscribes
            .fetch_add(topics as u64, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            deliveries: self
                .deliveries
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
                .collect(),
            dropped: self.dropped.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            connections_total: self.connections_total.load(Ordering::Relaxed),
            transport_subscribes: self.transport_subscribes.load(Ordering::Relaxed),
            transport_unsubscribes: self.transport_unsubscribes.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Deliveries per event type
    pub deliveries: BTreeMap<String, u64>,
    /// Undecodable broker messages
    pub dropped: u64,
    /// Filtered application events
    pub suppressed: u64,
    /// Currently open connections
    pub connections_active: u64,
    /// Connections ever opened
    pub connections_total: u64,
    /// Topics subscribed on the transport
    pub transport_subscribes: u64,
    /// Topics unsubscribed on the transport
    pub transport_unsubscribes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = RelayMetrics::new();
        metrics.record_delivery("new", 2);
        metrics.record_delivery("new", 1);
        metrics.record_delivery("logout", 1);
        metrics.record_delivery("read", 0);
        metrics.record_dropped();
        metrics.connection_opened();
        metrics.connection_opened();
        metrics.connection_closed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.deliveries.get("new"), Some(&3));
        assert_eq!(snapshot.deliveries.get("logout"), Some(&1));
        assert!(!snapshot.deliveries.contains_key("read"));
        assert_eq!(snapshot.dropped, 1);
        assert_eq!(snapshot.connections_total, 2);
        assert_eq!(snapshot.connections_active, 1);
    }

    #[test]
    fn test_active_connections_never_underflow() {
        let metrics = RelayMetrics::new();
        metrics.connection_closed();
        assert_eq!(metrics.snapshot().connections_active, 0);
    }
}
