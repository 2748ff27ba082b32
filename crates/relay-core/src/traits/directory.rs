//! Read-only directory lookups keyed by user or token id.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::result::AppResult;
use crate::types::topic;

/// Per-notification-type delivery option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationOption {
    /// Whether the notification is pushed over the socket.
    #[serde(default = "default_push")]
    pub push: bool,
}

impl Default for NotificationOption {
    fn default() -> Self {
        Self { push: true }
    }
}

fn default_push() -> bool {
    true
}

/// Enumerates the topics a user should receive.
///
/// Each method returns complete topic names.
#[async_trait]
pub trait InterestDirectory: Send + Sync + std::fmt::Debug + 'static {
    /// Watched forum topics.
    async fn forum_topic_topics(&self, user_id: u64) -> AppResult<Vec<String>>;

    /// Watched beatmapsets.
    async fn beatmapset_topics(&self, user_id: u64) -> AppResult<Vec<String>>;

    /// Chat channel memberships.
    async fn chat_channel_topics(&self, user_id: u64) -> AppResult<Vec<String>>;

    /// Generic follows.
    async fn follow_topics(&self, user_id: u64) -> AppResult<Vec<String>>;

    /// Per-type delivery preferences, keyed by notification name.
    async fn notification_options(
        &self,
        user_id: u64,
    ) -> AppResult<HashMap<String, NotificationOption>>;

    /// Full interest set: directory topics followed by the fixed per-user
    /// topics.
    async fn topics_for(&self, user_id: u64) -> AppResult<Vec<String>> {
        let (forum, beatmapset, chat, follows) = tokio::try_join!(
            self.forum_topic_topics(user_id),
            self.beatmapset_topics(user_id),
            self.chat_channel_topics(user_id),
            self.follow_topics(user_id),
        )?;

        let mut topics = Vec::with_capacity(
            forum.len() + beatmapset.len() + chat.len() + follows.len() + 5,
        );
        topics.extend(forum);
        topics.extend(beatmapset);
        topics.extend(chat);
        topics.extend(follows);
        topics.extend(topic::fixed_topics(user_id));
        Ok(topics)
    }
}

/// Active (not revoked, not expired) OAuth token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    /// Owning account.
    pub user_id: u64,
    /// Granted scopes.
    pub scopes: Vec<String>,
    /// Whether the owning account completed verification for this token.
    pub verified: bool,
}

/// Looks up OAuth access tokens.
#[async_trait]
pub trait TokenDirectory: Send + Sync + std::fmt::Debug + 'static {
    /// Returns the token if it exists, is not revoked and has not expired.
    async fn find_active_token(&self, token_id: &str) -> AppResult<Option<TokenRecord>>;
}
