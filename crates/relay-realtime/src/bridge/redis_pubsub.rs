//! Redis pub/sub transport.

#[cfg(feature = "redis-pubsub")]
pub mod implementation {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::StreamExt;
    use redis::aio::{PubSubSink, PubSubStream};
    use tokio::sync::{Mutex, mpsc};
    use tokio::task::JoinHandle;
    use tracing::{debug, info, warn};

    use relay_core::error::{AppError, ErrorKind};
    use relay_core::result::AppResult;
    use relay_core::traits::{BrokerMessage, PubSubTransport};

    /// First delay before reconnecting a dropped pub/sub connection.
    pub const RECONNECT_MIN_DELAY: Duration = Duration::from_millis(500);
    /// Upper bound of the reconnect backoff.
    pub const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(30);

    /// Doubles `delay`, capped at [`RECONNECT_MAX_DELAY`].
    pub fn next_delay(delay: Duration) -> Duration {
        delay.saturating_mul(2).min(RECONNECT_MAX_DELAY)
    }

    /// Command half of the connection and the topics it should carry.
    struct Subscriptions {
        sink: PubSubSink,
        /// Topics requested by the broker, replayed after a reconnect.
        topics: HashSet<String>,
    }

    /// Subscription side of a Redis pub/sub connection. Messages are
    /// forwarded by a background task into the receiver returned from
    /// [`RedisPubSub::connect`].
    ///
    /// When the connection drops, the forwarder reconnects with backoff
    /// and re-subscribes every topic currently requested.
    pub struct RedisPubSub {
        shared: Arc<Mutex<Subscriptions>>,
    }

    impl std::fmt::Debug for RedisPubSub {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("RedisPubSub").finish_non_exhaustive()
        }
    }

    impl RedisPubSub {
        /// Opens a pub/sub connection to `url`.
        ///
        /// The returned task runs until the receiver is dropped.
        pub async fn connect(
            url: &str,
            buffer_size: usize,
        ) -> AppResult<(Self, mpsc::Receiver<BrokerMessage>, JoinHandle<()>)> {
            let client = redis::Client::open(url).map_err(|e| {
                AppError::with_source(ErrorKind::Transport, "Invalid broadcast Redis URL", e)
            })?;
            let pubsub = client.get_async_pubsub().await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Transport,
                    "Failed to open Redis pub/sub connection",
                    e,
                )
            })?;
            let (sink, stream) = pubsub.split();

            let shared = Arc::new(Mutex::new(Subscriptions {
                sink,
                topics: HashSet::new(),
            }));
            let (sender, receiver) = mpsc::channel(buffer_size);
            let forwarder = tokio::spawn(forward(client, shared.clone(), stream, sender));

            info!("Redis pub/sub connected");
            Ok((Self { shared }, receiver, forwarder))
        }
    }

    /// Pumps the stream into `sender`, reconnecting whenever it ends.
    async fn forward(
        client: redis::Client,
        shared: Arc<Mutex<Subscriptions>>,
        mut stream: PubSubStream,
        sender: mpsc::Sender<BrokerMessage>,
    ) {
        loop {
            while let Some(msg) = stream.next().await {
                let topic = msg.get_channel_name().to_string();
                let payload = match msg.get_payload::<String>() {
                    Ok(payload) => payload,
                    Err(e) => {
                        debug!(topic = %topic, error = %e, "Dropping non-text pub/sub payload");
                        continue;
                    }
                };
                if sender.send(BrokerMessage { topic, payload }).await.is_err() {
                    debug!("Broker receiver dropped, stopping pub/sub forwarder");
                    return;
                }
            }

            warn!("Redis pub/sub stream ended, reconnecting");
            stream = match reconnect(&client, &shared, &sender).await {
                Some(stream) => stream,
                None => return,
            };
        }
    }

    /// Opens a fresh connection, replays the requested topics on it and
    /// swaps it in. Gives up only once the broker is gone.
    async fn reconnect(
        client: &redis::Client,
        shared: &Mutex<Subscriptions>,
        sender: &mpsc::Sender<BrokerMessage>,
    ) -> Option<PubSubStream> {
        let mut delay = RECONNECT_MIN_DELAY;
        loop {
            tokio::time::sleep(delay).await;
            if sender.is_closed() {
                return None;
            }

            match client.get_async_pubsub().await {
                Ok(pubsub) => {
                    let (mut sink, stream) = pubsub.split();
                    let mut subscriptions = shared.lock().await;
                    let topics: Vec<String> = subscriptions.topics.iter().cloned().collect();

                    let replayed = if topics.is_empty() {
                        Ok(())
                    } else {
                        sink.subscribe(&topics).await
                    };
                    match replayed {
                        Ok(()) => {
                            subscriptions.sink = sink;
                            info!(topics = topics.len(), "Redis pub/sub reconnected");
                            return Some(stream);
                        }
                        Err(e) => {
                            warn!(error = %e, retry_ms = delay.as_millis() as u64, "Re-subscribing after reconnect failed");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, retry_ms = delay.as_millis() as u64, "Redis pub/sub reconnect failed");
                }
            }

            delay = next_delay(delay);
        }
    }

    #[async_trait]
    impl PubSubTransport for RedisPubSub {
        async fn subscribe(&self, topics: &[String]) -> AppResult<()> {
            let mut subscriptions = self.shared.lock().await;
            subscriptions.topics.extend(topics.iter().cloned());
            subscriptions
                .sink
                .subscribe(topics)
                .await
                .map_err(|e| AppError::transport(format!("Redis SUBSCRIBE failed: {e}")))
        }

        async fn unsubscribe(&self, topics: &[String]) -> AppResult<()> {
            let mut subscriptions = self.shared.lock().await;
            for topic in topics {
                subscriptions.topics.remove(topic);
            }
            subscriptions
                .sink
                .unsubscribe(topics)
                .await
                .map_err(|e| AppError::transport(format!("Redis UNSUBSCRIBE failed: {e}")))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_backoff_doubles_up_to_cap() {
            let mut delay = RECONNECT_MIN_DELAY;
            let mut seen = vec![delay];
            while delay < RECONNECT_MAX_DELAY {
                delay = next_delay(delay);
                seen.push(delay);
            }

            assert_eq!(seen[1], Duration::from_secs(1));
            assert_eq!(seen[2], Duration::from_secs(2));
            assert_eq!(*seen.last().unwrap(), RECONNECT_MAX_DELAY);
            assert_eq!(next_delay(RECONNECT_MAX_DELAY), RECONNECT_MAX_DELAY);
        }

        /// Kills the pub/sub connection server-side and checks that
        /// subscriptions survive the reconnect.
        #[tokio::test]
        #[ignore = "requires a Redis server at RELAY_TEST_REDIS_URL"]
        async fn test_resubscribes_after_connection_loss() {
            let url = std::env::var("RELAY_TEST_REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
            let (transport, mut messages, _forwarder) = RedisPubSub::connect(&url, 16).await.unwrap();
            transport.subscribe(&["relay-test:reconnect".to_string()]).await.unwrap();

            let client = redis::Client::open(url.as_str()).unwrap();
            let mut conn = client.get_multiplexed_async_connection().await.unwrap();
            redis::cmd("CLIENT")
                .arg("KILL")
                .arg("TYPE")
                .arg("pubsub")
                .query_async::<i64>(&mut conn)
                .await
                .unwrap();

            let received = tokio::time::timeout(Duration::from_secs(10), async {
                loop {
                    redis::cmd("PUBLISH")
                        .arg("relay-test:reconnect")
                        .arg(r#"{"event":"ping"}"#)
                        .query_async::<i64>(&mut conn)
                        .await
                        .unwrap();
                    tokio::select! {
                        message = messages.recv() => return message,
                        _ = tokio::time::sleep(Duration::from_millis(200)) => {}
                    }
                }
            })
            .await
            .unwrap()
            .unwrap();

            assert_eq!(received.topic, "relay-test:reconnect");
            assert_eq!(received.payload, r#"{"event":"ping"}"#);
        }
    }
}

#[cfg(feature = "redis-pubsub")]
pub use implementation::RedisPubSub;
