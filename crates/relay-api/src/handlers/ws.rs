//! WebSocket upgrade handler.
//!
//! Authentication happens before the upgrade completes, but a rejected
//! client is still upgraded so it can read the failure frame.

use std::sync::Arc;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use relay_auth::AuthFailure;
use relay_core::types::UserSession;
use relay_realtime::{OutboundFrame, UserConnection};

use crate::extractors::Handshake;
use crate::state::AppState;

/// GET /: WebSocket upgrade
pub async fn ws_handler(
    State(state): State<AppState>,
    handshake: Handshake,
    ws: WebSocketUpgrade,
) -> Response {
    match state.resolver.resolve(&handshake.request).await {
        Ok(session) => {
            debug!(
                user_id = session.user_id,
                user_agent = handshake.user_agent.as_deref().unwrap_or("-"),
                "Handshake authenticated"
            );
            ws.on_upgrade(move |socket| handle_connection(state, session, socket))
        }
        Err(_) => ws.on_upgrade(reject),
    }
}

/// Sends the authentication failure frame and closes.
async fn reject(mut socket: WebSocket) {
    if socket
        .send(Message::Text(Utf8Bytes::from_static(AuthFailure::CLIENT_FRAME)))
        .await
        .is_ok()
    {
        let _ = socket.send(Message::Close(None)).await;
    }
}

/// Drives an authenticated socket until either side closes.
async fn handle_connection(state: AppState, session: UserSession, socket: WebSocket) {
    let (connection, frames) = state.engine.open(session);
    let cancel = connection.cancellation();
    let (sink, stream) = socket.split();

    let writer = tokio::spawn(write_frames(sink, frames, cancel.clone()));

    // Boot runs beside the reader so a client that leaves mid-boot is
    // noticed; boot skips subscribing once the connection is closed.
    let booting = {
        let connection = connection.clone();
        tokio::spawn(async move { connection.boot().await })
    };

    read_frames(&connection, stream, &cancel).await;

    connection.close().await;
    let _ = booting.await;
    let _ = writer.await;
}

/// Inbound loop. Only pongs and closes matter; client text is not part of
/// the protocol.
async fn read_frames(
    connection: &Arc<UserConnection>,
    mut stream: SplitStream<WebSocket>,
    cancel: &CancellationToken,
) {
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => break,
            message = stream.next() => message,
        };

        match message {
            Some(Ok(Message::Pong(_))) => connection.ack_heartbeat(),
            Some(Ok(Message::Text(text))) => {
                debug!(
                    conn_id = %connection.id(),
                    len = text.len(),
                    "Dropping client text frame"
                );
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                debug!(conn_id = %connection.id(), error = %e, "WebSocket read error");
                break;
            }
        }
    }
}

/// Outbound loop. Once the connection is cancelled, frames already queued
/// (such as the logout notice) are flushed before the close frame.
async fn write_frames(
    mut sink: SplitSink<WebSocket, Message>,
    mut frames: mpsc::Receiver<OutboundFrame>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Some(frame) => {
                    if sink.send(to_message(frame)).await.is_err() {
                        return;
                    }
                }
                None => break,
            },
            _ = cancel.cancelled() => {
                while let Ok(frame) = frames.try_recv() {
                    if sink.send(to_message(frame)).await.is_err() {
                        return;
                    }
                }
                break;
            }
        }
    }

    let _ = sink.send(Message::Close(None)).await;
}

fn to_message(frame: OutboundFrame) -> Message {
    match frame {
        OutboundFrame::Text(text) => Message::Text(text.to_string().into()),
        OutboundFrame::Ping => Message::Ping(Default::default()),
    }
}
