//! Topic → subscriber table with explicit reference counts.

use std::collections::HashMap;
use std::sync::Arc;

use super::subscriber::{ConnectionId, Subscriber};

/// Subscribers of one topic.
struct TopicEntry {
    subscribers: HashMap<ConnectionId, Arc<dyn Subscriber>>,
    /// Number of subscribers; the topic is held on the transport while > 0.
    refcount: usize,
}

impl TopicEntry {
    fn new() -> Self {
        Self {
            subscribers: HashMap::new(),
            refcount: 0,
        }
    }
}

/// Membership table. Not synchronized; the broker guards it.
#[derive(Default)]
pub struct TopicTable {
    topics: HashMap<String, TopicEntry>,
}

impl std::fmt::Debug for TopicTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicTable")
            .field("topics", &self.topics.len())
            .finish()
    }
}

impl TopicTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `subscriber` to `topic`. Returns `true` when the topic went
    /// from no subscribers to one. Adding an existing member changes
    /// nothing.
    pub fn add(&mut self, topic: &str, subscriber: Arc<dyn Subscriber>) -> bool {
        let entry = self
            .topics
            .entry(topic.to_string())
            .or_insert_with(TopicEntry::new);

        let id = subscriber.id();
        if entry.subscribers.contains_key(&id) {
            return false;
        }
        entry.subscribers.insert(id, subscriber);
        entry.refcount += 1;
        entry.refcount == 1
    }

    /// Removes `id` from `topic`. Returns `true` when that removed the last
    /// subscriber, in which case the topic is dropped from the table.
    pub fn remove(&mut self, topic: &str, id: ConnectionId) -> bool {
        let Some(entry) = self.topics.get_mut(topic) else {
            return false;
        };
        if entry.subscribers.remove(&id).is_none() {
            return false;
        }
        entry.refcount -= 1;
        if entry.refcount > 0 {
            return false;
        }
        self.topics.remove(topic);
        true
    }

    /// Every topic `id` is currently registered on.
    pub fn topics_of(&self, id: ConnectionId) -> Vec<String> {
        self.topics
            .iter()
            .filter(|(_, entry)| entry.subscribers.contains_key(&id))
            .map(|(topic, _)| topic.clone())
            .collect()
    }

    /// Snapshot of a topic's subscribers.
    pub fn subscribers(&self, topic: &str) -> Vec<Arc<dyn Subscriber>> {
        self.topics
            .get(topic)
            .map(|entry| entry.subscribers.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Reference count of a topic.
    pub fn refcount(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, |entry| entry.refcount)
    }

    /// Number of topics with at least one subscriber.
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// Whether no topic has subscribers.
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}
