//! End-to-end flows through the engine with an in-memory transport.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use relay_core::config::RealtimeConfig;
use relay_core::result::AppResult;
use relay_core::traits::{InterestDirectory, NotificationOption};
use relay_core::types::UserSession;
use relay_realtime::bridge::memory_pubsub::{MemoryPubSub, TransportCall};
use relay_realtime::connection::ConnectionState;
use relay_realtime::{OutboundFrame, RelayEngine, UserConnection};

/// Every user watches beatmapset 5.
#[derive(Debug)]
struct BeatmapsetWatcher;

#[async_trait]
impl InterestDirectory for BeatmapsetWatcher {
    async fn forum_topic_topics(&self, _: u64) -> AppResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn beatmapset_topics(&self, _: u64) -> AppResult<Vec<String>> {
        Ok(vec!["new:beatmapset:5".to_string()])
    }

    async fn chat_channel_topics(&self, _: u64) -> AppResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn follow_topics(&self, _: u64) -> AppResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn notification_options(&self, _: u64) -> AppResult<HashMap<String, NotificationOption>> {
        Ok(HashMap::new())
    }
}

fn session(user_id: u64, key: &str, requires_verification: bool) -> UserSession {
    UserSession {
        key: key.to_string(),
        user_id,
        scopes: HashSet::from(["*".to_string()]),
        requires_verification,
        verified: false,
        ip: Some("127.0.0.1".to_string()),
    }
}

fn engine(config: RealtimeConfig) -> (RelayEngine, Arc<MemoryPubSub>) {
    let (transport, messages) = MemoryPubSub::new(64);
    let transport = Arc::new(transport);
    let engine = RelayEngine::new(&config, transport.clone(), Arc::new(BeatmapsetWatcher));
    engine.start(messages);
    (engine, transport)
}

async fn connect(
    engine: &RelayEngine,
    session: UserSession,
) -> (Arc<UserConnection>, mpsc::Receiver<OutboundFrame>) {
    let (conn, rx) = engine.open(session);
    conn.boot().await;
    (conn, rx)
}

async fn next_text(rx: &mut mpsc::Receiver<OutboundFrame>) -> String {
    loop {
        match tokio::time::timeout(Duration::from_secs(1), rx.recv()).await {
            Ok(Some(OutboundFrame::Text(text))) => return text.to_string(),
            Ok(Some(OutboundFrame::Ping)) => continue,
            other => panic!("expected a text frame, got {other:?}"),
        }
    }
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_logout_closes_matching_connection() {
    let (engine, transport) = engine(RealtimeConfig::default());
    let (conn, mut rx) = connect(&engine, session(7, "oauth:abc", false)).await;

    assert!(
        transport
            .publish(
                "user_session:7",
                r#"{"event":"logout","data":{"keys":["oauth:abc"]}}"#
            )
            .await
    );

    assert_eq!(next_text(&mut rx).await, r#"{"event":"logout"}"#);
    settle().await;

    assert_eq!(conn.state(), ConnectionState::Closed);
    assert!(conn.cancellation().is_cancelled());
    assert!(!transport.is_subscribed("new:beatmapset:5").await);
    assert!(!transport.is_subscribed("user_session:7").await);
}

#[tokio::test]
async fn test_two_connections_receive_same_raw_payload() {
    let (engine, transport) = engine(RealtimeConfig::default());
    let (_c1, mut rx1) = connect(&engine, session(7, "oauth:one", false)).await;
    let (_c2, mut rx2) = connect(&engine, session(8, "oauth:two", false)).await;

    let payload = r#"{"event":"new", "data":{"source_user_id":9}}"#;
    assert!(transport.publish("new:beatmapset:5", payload).await);

    assert_eq!(next_text(&mut rx1).await, payload);
    assert_eq!(next_text(&mut rx2).await, payload);

    let subscribes: Vec<_> = transport
        .calls()
        .await
        .into_iter()
        .filter(|call| match call {
            TransportCall::Subscribe(topics) => topics.iter().any(|t| t == "new:beatmapset:5"),
            TransportCall::Unsubscribe(_) => false,
        })
        .collect();
    assert_eq!(subscribes.len(), 1);
    assert_eq!(engine.metrics().deliveries.get("new"), Some(&2));
}

#[tokio::test]
async fn test_verification_gating_suppresses_one_connection() {
    let (engine, transport) = engine(RealtimeConfig::default());
    let (_c1, mut rx1) = connect(&engine, session(7, "oauth:one", true)).await;
    let (_c2, mut rx2) = connect(&engine, session(8, "oauth:two", false)).await;

    let payload = r#"{"event":"new","data":{"source_user_id":9}}"#;
    transport.publish("new:beatmapset:5", payload).await;

    assert_eq!(next_text(&mut rx2).await, payload);
    settle().await;
    assert!(rx1.try_recv().is_err());
}

#[tokio::test]
async fn test_self_event_policy() {
    let config = RealtimeConfig {
        suppress_self_events: true,
        ..RealtimeConfig::default()
    };
    let (engine, transport) = engine(config);
    let (_c1, mut rx1) = connect(&engine, session(9, "oauth:self", false)).await;
    let (_c2, mut rx2) = connect(&engine, session(8, "oauth:other", false)).await;

    let payload = r#"{"event":"new","data":{"source_user_id":9}}"#;
    transport.publish("new:beatmapset:5", payload).await;

    assert_eq!(next_text(&mut rx2).await, payload);
    settle().await;
    assert!(rx1.try_recv().is_err());
}

#[tokio::test]
async fn test_shutdown_cancels_connections() {
    let (engine, _transport) = engine(RealtimeConfig::default());
    let (conn, _rx) = connect(&engine, session(7, "oauth:abc", false)).await;

    engine.shutdown();

    assert!(engine.is_shutting_down());
    assert!(conn.cancellation().is_cancelled());
    conn.close().await;
    assert_eq!(engine.broker().topic_count().await, 0);
    assert_eq!(engine.metrics().connections_active, 0);
}
