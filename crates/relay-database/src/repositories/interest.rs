//! Topics a user watches, and their notification delivery options.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::Row;
use sqlx::mysql::MySqlPool;
use tracing::warn;

use relay_core::result::AppResult;
use relay_core::traits::{InterestDirectory, NotificationOption};
use relay_core::types::topic;

use crate::connection::db_error;

/// Interest directory reading the web application's watch tables.
#[derive(Debug, Clone)]
pub struct SqlInterestDirectory {
    pool: MySqlPool,
    chat_database: String,
}

impl SqlInterestDirectory {
    /// Creates a directory over `pool`. Chat memberships are read from the
    /// `chat_database` schema.
    pub fn new(pool: MySqlPool, chat_database: impl Into<String>) -> Self {
        Self {
            pool,
            chat_database: chat_database.into(),
        }
    }

    async fn fetch_ids(&self, sql: &str, user_id: u64, context: &str) -> AppResult<Vec<u64>> {
        let rows = sqlx::query(sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error(context, e))?;

        rows.iter()
            .map(|row| row.try_get::<u64, _>("id").map_err(|e| db_error(context, e)))
            .collect()
    }
}

#[async_trait]
impl InterestDirectory for SqlInterestDirectory {
    async fn forum_topic_topics(&self, user_id: u64) -> AppResult<Vec<String>> {
        let ids = self
            .fetch_ids(
                "SELECT CAST(topic_id AS UNSIGNED) AS id FROM phpbb_topics_watch WHERE user_id = ?",
                user_id,
                "Failed to load forum topic watches",
            )
            .await?;
        Ok(ids.into_iter().map(topic::forum_topic).collect())
    }

    async fn beatmapset_topics(&self, user_id: u64) -> AppResult<Vec<String>> {
        let ids = self
            .fetch_ids(
                "SELECT CAST(beatmapset_id AS UNSIGNED) AS id FROM beatmapset_watches WHERE user_id = ?",
                user_id,
                "Failed to load beatmapset watches",
            )
            .await?;
        Ok(ids.into_iter().map(topic::beatmapset).collect())
    }

    async fn chat_channel_topics(&self, user_id: u64) -> AppResult<Vec<String>> {
        let sql = format!(
            "SELECT CAST(channel_id AS UNSIGNED) AS id FROM {}.user_channels WHERE user_id = ? AND hidden = false",
            self.chat_database
        );
        let ids = self
            .fetch_ids(&sql, user_id, "Failed to load chat channel memberships")
            .await?;
        Ok(ids.into_iter().map(topic::chat_channel).collect())
    }

    async fn follow_topics(&self, user_id: u64) -> AppResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT notifiable_type, CAST(notifiable_id AS UNSIGNED) AS notifiable_id \
             FROM follows WHERE user_id = ? AND subtype = 'comment'",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load follows", e))?;

        rows.iter()
            .map(|row| {
                let kind: String = row
                    .try_get("notifiable_type")
                    .map_err(|e| db_error("Failed to read follow type", e))?;
                let id: u64 = row
                    .try_get("notifiable_id")
                    .map_err(|e| db_error("Failed to read follow id", e))?;
                Ok(topic::follow(&kind, id))
            })
            .collect()
    }

    async fn notification_options(
        &self,
        user_id: u64,
    ) -> AppResult<HashMap<String, NotificationOption>> {
        let rows = sqlx::query(
            "SELECT name, CAST(details AS CHAR) AS details \
             FROM user_notification_options WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load notification options", e))?;

        let mut options = HashMap::with_capacity(rows.len());
        for row in &rows {
            let name: String = row
                .try_get("name")
                .map_err(|e| db_error("Failed to read notification option name", e))?;
            let details: Option<String> = row
                .try_get("details")
                .map_err(|e| db_error("Failed to read notification option details", e))?;
            options.insert(name, parse_option(details.as_deref()));
        }
        Ok(options)
    }
}

/// Parses the `details` JSON of a notification option row. Unreadable
/// details fall back to the default (pushed).
fn parse_option(details: Option<&str>) -> NotificationOption {
    match details {
        Some(raw) => serde_json::from_str(raw).unwrap_or_else(|e| {
            warn!(error = %e, "Ignoring unreadable notification option details");
            NotificationOption::default()
        }),
        None => NotificationOption::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_option() {
        assert!(!parse_option(Some(r#"{"push": false, "mail": true}"#)).push);
        assert!(parse_option(Some(r#"{"push": true}"#)).push);
        assert!(parse_option(Some(r#"{"mail": false}"#)).push);
        assert!(parse_option(Some("not json")).push);
        assert!(parse_option(None).push);
    }
}
