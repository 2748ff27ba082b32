//! Liveness probing.

use std::sync::Weak;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::user_connection::UserConnection;

/// Run heartbeat loop for a connection.
///
/// Every `period` the previous ping must have been acknowledged; if it
/// was not, the peer is considered gone and the connection is closed.
/// Otherwise a new ping is sent.
pub async fn run_heartbeat(
    connection: Weak<UserConnection>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(connection) = connection.upgrade() else {
            break;
        };

        if !connection.send_ping() {
            info!(conn_id = %connection.id(), "Heartbeat not acknowledged, closing");
            connection.close().await;
            break;
        }
    }

    debug!("Heartbeat loop ended");
}
