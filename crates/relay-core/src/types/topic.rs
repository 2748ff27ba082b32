//! Topic names used on the publish/subscribe transport.
//!
//! Every per-user topic is built here so that publishers and the relay
//! agree on the exact spelling.

/// Read-marker events for a user.
pub fn notification_read(user_id: u64) -> String {
    format!("notification_read:{user_id}")
}

/// Control channel for dynamic subscribe/unsubscribe.
pub fn user_subscription(user_id: u64) -> String {
    format!("user_subscription:{user_id}")
}

/// Control channel for session invalidation and verification.
pub fn user_session(user_id: u64) -> String {
    format!("user_session:{user_id}")
}

/// Events addressed privately to a user.
pub fn private_user(user_id: u64) -> String {
    format!("private:user:{user_id}")
}

/// New-item events addressed to a user.
pub fn new_user(user_id: u64) -> String {
    format!("new:user:{user_id}")
}

/// New posts in a watched forum topic.
pub fn forum_topic(topic_id: u64) -> String {
    format!("new:forum_topic:{topic_id}")
}

/// Activity on a watched beatmapset.
pub fn beatmapset(beatmapset_id: u64) -> String {
    format!("new:beatmapset:{beatmapset_id}")
}

/// Messages in a chat channel the user belongs to.
pub fn chat_channel(channel_id: u64) -> String {
    format!("chat:channel:{channel_id}")
}

/// Activity on a followed item.
pub fn follow(notifiable_type: &str, notifiable_id: u64) -> String {
    format!("new:{notifiable_type}:{notifiable_id}")
}

/// Topics every connection of `user_id` listens to regardless of
/// directory contents.
pub fn fixed_topics(user_id: u64) -> Vec<String> {
    vec![
        notification_read(user_id),
        user_subscription(user_id),
        user_session(user_id),
        private_user(user_id),
        new_user(user_id),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_topics() {
        assert_eq!(
            fixed_topics(7),
            vec![
                "notification_read:7",
                "user_subscription:7",
                "user_session:7",
                "private:user:7",
                "new:user:7",
            ]
        );
    }

    #[test]
    fn test_resource_topics() {
        assert_eq!(beatmapset(5), "new:beatmapset:5");
        assert_eq!(forum_topic(12), "new:forum_topic:12");
        assert_eq!(chat_channel(3), "chat:channel:3");
        assert_eq!(follow("comment", 9), "new:comment:9");
    }
}
