//! Per-type push preferences of one connection's user.

use std::collections::HashMap;

use dashmap::DashMap;

use relay_core::traits::NotificationOption;

/// Preference map. Types without an entry are delivered.
#[derive(Debug, Default)]
pub struct NotificationPreferences {
    options: DashMap<String, NotificationOption>,
}

impl NotificationPreferences {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the map with options loaded from the directory.
    pub fn replace_all(&self, options: HashMap<String, NotificationOption>) {
        self.options.clear();
        for (name, option) in options {
            self.options.insert(name, option);
        }
    }

    /// Updates one type.
    pub fn set(&self, name: impl Into<String>, option: NotificationOption) {
        self.options.insert(name.into(), option);
    }

    /// Whether notifications of type `name` are pushed.
    pub fn allows_push(&self, name: &str) -> bool {
        self.options.get(name).is_none_or(|option| option.push)
    }

    /// Number of explicit entries.
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// Whether no type has an explicit entry.
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}
