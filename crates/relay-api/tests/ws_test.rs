//! Full handshake-to-delivery flows over a real socket.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::StreamExt;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tower::ServiceExt;

use relay_api::app::{build_app, serve};
use relay_api::dto::response::HealthResponse;
use relay_api::AppState;
use relay_auth::oauth::AccessTokenClaims;
use relay_auth::{AuthFailure, IdentityResolver, OAuthVerifier, SessionVerifier};
use relay_core::config::RealtimeConfig;
use relay_core::result::AppResult;
use relay_core::traits::{InterestDirectory, NotificationOption, TokenDirectory, TokenRecord};
use relay_realtime::RelayEngine;
use relay_realtime::bridge::memory_pubsub::MemoryPubSub;

const PRIVATE_KEY: &[u8] = include_bytes!("../../relay-auth/tests/fixtures/oauth-private.key");
const PUBLIC_KEY: &[u8] = include_bytes!("../../relay-auth/tests/fixtures/oauth-public.key");

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug)]
struct OneToken;

#[async_trait]
impl TokenDirectory for OneToken {
    async fn find_active_token(&self, token_id: &str) -> AppResult<Option<TokenRecord>> {
        Ok((token_id == "abc").then(|| TokenRecord {
            user_id: 7,
            scopes: vec!["*".to_string()],
            verified: true,
        }))
    }
}

#[derive(Debug)]
struct NoInterests;

#[async_trait]
impl InterestDirectory for NoInterests {
    async fn forum_topic_topics(&self, _: u64) -> AppResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn beatmapset_topics(&self, _: u64) -> AppResult<Vec<String>> {
        Ok(Vec::new())
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

struct Relay {
    addr: SocketAddr,
    state: AppState,
    transport: Arc<MemoryPubSub>,
}

async fn spawn_relay() -> Relay {
    let (transport, messages) = MemoryPubSub::new(64);
    let transport = Arc::new(transport);
    let engine = RelayEngine::new(
        &RealtimeConfig::default(),
        transport.clone(),
        Arc::new(NoInterests),
    );
    engine.start(messages);

    let oauth = OAuthVerifier::new(PUBLIC_KEY, Arc::new(OneToken), "chat.read").unwrap();
    let resolver = IdentityResolver::new(
        vec![Arc::new(oauth) as Arc<dyn SessionVerifier>],
        "osu_session",
    );
    let state = AppState::new(Arc::new(resolver), engine);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, state.clone(), std::future::pending()));

    Relay {
        addr,
        state,
        transport,
    }
}

fn token(jti: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;
    let claims = AccessTokenClaims {
        jti: jti.to_string(),
        sub: Some("7".to_string()),
        aud: Some("1".to_string()),
        iat: Some(now),
        exp: now + 3600,
        scopes: vec!["*".to_string()],
    };
    encode(
        &Header::new(Algorithm::RS256),
        &claims,
        &EncodingKey::from_rsa_pem(PRIVATE_KEY).unwrap(),
    )
    .unwrap()
}

async fn connect(addr: SocketAddr, bearer: Option<&str>) -> Client {
    let mut request = format!("ws://{addr}/").into_client_request().unwrap();
    if let Some(token) = bearer {
        request
            .headers_mut()
            .insert("authorization", format!("Bearer {token}").parse().unwrap());
    }
    let (client, _) = connect_async(request).await.unwrap();
    client
}

async fn next_text(client: &mut Client) -> String {
    loop {
        match tokio::time::timeout(Duration::from_secs(2), client.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => return text.as_str().to_owned(),
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => continue,
            other => panic!("expected a text frame, got {other:?}"),
        }
    }
}

async fn expect_closed(client: &mut Client) {
    loop {
        match tokio::time::timeout(Duration::from_secs(2), client.next()).await {
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) | Ok(Some(Err(_))) => return,
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => continue,
            other => panic!("expected the socket to close, got {other:?}"),
        }
    }
}

async fn wait_for(transport: &MemoryPubSub, topic: &str, subscribed: bool) {
    for _ in 0..200 {
        if transport.is_subscribed(topic).await == subscribed {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{topic} never reached subscribed = {subscribed}");
}

#[tokio::test]
async fn test_missing_credentials_get_failure_frame() {
    let relay = spawn_relay().await;
    let mut client = connect(relay.addr, None).await;

    assert_eq!(next_text(&mut client).await, AuthFailure::CLIENT_FRAME);
    expect_closed(&mut client).await;
}

#[tokio::test]
async fn test_unknown_token_gets_failure_frame() {
    let relay = spawn_relay().await;
    let mut client = connect(relay.addr, Some(&token("revoked"))).await;

    assert_eq!(next_text(&mut client).await, AuthFailure::CLIENT_FRAME);
    expect_closed(&mut client).await;
    assert_eq!(relay.state.engine.metrics().connections_total, 0);
}

#[tokio::test]
async fn test_published_event_reaches_client() {
    let relay = spawn_relay().await;
    let mut client = connect(relay.addr, Some(&token("abc"))).await;
    wait_for(&relay.transport, "private:user:7", true).await;

    let payload = r#"{"event":"new","data":{"name":"beatmapset_discussion_post_new"}}"#;
    assert!(relay.transport.publish("private:user:7", payload).await);

    assert_eq!(next_text(&mut client).await, payload);
}

#[tokio::test]
async fn test_logout_closes_socket_and_releases_topics() {
    let relay = spawn_relay().await;
    let mut client = connect(relay.addr, Some(&token("abc"))).await;
    wait_for(&relay.transport, "user_session:7", true).await;

    relay
        .transport
        .publish(
            "user_session:7",
            r#"{"event":"logout","data":{"keys":["oauth:abc"]}}"#,
        )
        .await;

    assert_eq!(next_text(&mut client).await, r#"{"event":"logout"}"#);
    expect_closed(&mut client).await;
    wait_for(&relay.transport, "user_session:7", false).await;
    wait_for(&relay.transport, "private:user:7", false).await;
}

#[tokio::test]
async fn test_client_disconnect_releases_topics() {
    let relay = spawn_relay().await;
    let mut client = connect(relay.addr, Some(&token("abc"))).await;
    wait_for(&relay.transport, "new:user:7", true).await;

    client.close(None).await.unwrap();

    wait_for(&relay.transport, "new:user:7", false).await;
}

#[tokio::test]
async fn test_health_reports_metrics() {
    let relay = spawn_relay().await;

    let response = build_app(relay.state.clone())
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.topics, 0);
    assert_eq!(health.metrics.connections_active, 0);

    relay.state.engine.shutdown();
    let response = build_app(relay.state.clone())
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.status, "shutting_down");
}

#[tokio::test]
async fn test_health_fails_when_transport_stream_closes() {
    let (transport, _) = MemoryPubSub::new(4);
    let (feed, messages) = MemoryPubSub::new(4);
    let engine = RelayEngine::new(
        &RealtimeConfig::default(),
        Arc::new(transport),
        Arc::new(NoInterests),
    );
    let pump = engine.start(messages);
    drop(feed);

    tokio::time::timeout(Duration::from_secs(5), engine.stopped())
        .await
        .unwrap();
    pump.await.unwrap();

    let oauth = OAuthVerifier::new(PUBLIC_KEY, Arc::new(OneToken), "chat.read").unwrap();
    let resolver = IdentityResolver::new(
        vec![Arc::new(oauth) as Arc<dyn SessionVerifier>],
        "osu_session",
    );
    let state = AppState::new(Arc::new(resolver), engine);
    let response = build_app(state)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.status, "shutting_down");
}
