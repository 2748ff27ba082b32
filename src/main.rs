//! Notification relay server.
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt};

use relay_api::AppState;
use relay_auth::{IdentityResolver, LaravelSessionVerifier, OAuthVerifier, SessionVerifier};
use relay_cache::{RedisClient, RedisSessionStore};
use relay_core::config::RelayConfig;
use relay_core::error::{AppError, ErrorKind};
use relay_database::{DatabasePool, SqlInterestDirectory, SqlTokenDirectory};
use relay_realtime::RelayEngine;
use relay_realtime::bridge::RedisPubSub;

#[tokio::main]
async fn main() {
    let env = std::env::var("RELAY_ENV").unwrap_or_else(|_| "development".to_string());

    let config = match RelayConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(env = %env, "Configuration loaded");

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &RelayConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: RelayConfig) -> Result<(), AppError> {
    tracing::info!("Starting notification relay v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Database ─────────────────────────────────────────
    let db_pool = DatabasePool::connect(&config.database).await?;
    let interests = Arc::new(SqlInterestDirectory::new(
        db_pool.pool().clone(),
        config.database.chat_database.clone(),
    ));
    let tokens = Arc::new(SqlTokenDirectory::new(db_pool.pool().clone()));

    // ── Step 2: Session store ────────────────────────────────────
    let session_redis = RedisClient::connect(&config.redis.session_url).await?;
    let sessions = Arc::new(RedisSessionStore::new(session_redis));

    // ── Step 3: Credential verifiers ─────────────────────────────
    let oauth = OAuthVerifier::from_config(&config.auth, tokens)?;
    let laravel = LaravelSessionVerifier::from_config(&config.auth, sessions)?;
    let resolver = Arc::new(IdentityResolver::new(
        vec![
            Arc::new(oauth) as Arc<dyn SessionVerifier>,
            Arc::new(laravel) as Arc<dyn SessionVerifier>,
        ],
        config.auth.session_cookie_name.clone(),
    ));
    tracing::info!("Credential verifiers initialized");

    // ── Step 4: Broadcast transport + engine ─────────────────────
    let (transport, messages, transport_task) = RedisPubSub::connect(
        &config.redis.broadcast_url,
        config.realtime.transport_buffer_size,
    )
    .await?;
    let engine = RelayEngine::new(&config.realtime, Arc::new(transport), interests);
    let broker_task = engine.start(messages);

    // ── Step 5: HTTP server ──────────────────────────────────────
    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Configuration,
            format!("Failed to bind {}", addr),
            e,
        )
    })?;
    tracing::info!("Notification relay listening on {}", addr);

    // ── Step 6: Graceful shutdown ────────────────────────────────
    let state = AppState::new(resolver, engine.clone());
    let shutdown_engine = engine.clone();
    relay_api::app::serve(listener, state, async move {
        tokio::select! {
            _ = shutdown_signal() => {
                tracing::info!("Shutdown signal received, starting graceful shutdown...");
                shutdown_engine.shutdown();
            }
            _ = shutdown_engine.stopped() => {
                tracing::error!("Relay engine stopped, shutting down server");
            }
        }
    })
    .await?;

    // ── Step 7: Wait for background tasks ────────────────────────
    engine.shutdown();
    let _ = broker_task.await;
    transport_task.abort();
    db_pool.close().await;

    tracing::info!("Notification relay shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
