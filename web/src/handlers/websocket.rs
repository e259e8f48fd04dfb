//! WebSocket streaming of store broadcasts.
//!
//! The store broadcasts every action produced by its effects. This module
//! pumps a projection of those actions to a WebSocket client:
//!
//! ```text
//! Client          WebSocket Handler          Store
//!   │                    │                     │
//!   ├─ Connect ─────────>│                     │
//!   │                    ├─ subscribe() ──────>│
//!   │<─ Initial message ─┤                     │
//!   │                    │<── broadcast ───────┤
//!   │<─ Projected msg ───┤                     │
//!   │<─ Ping (interval) ─┤                     │
//! ```
//!
//! The stream is server-to-client only. Client text frames are logged and
//! ignored; a close frame ends the connection.

use axum::extract::ws::{Message, WebSocket};
use futures::{stream::StreamExt, Sink, SinkExt};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};

/// Tuning for [`stream_actions`].
#[derive(Debug, Clone, Copy)]
pub struct StreamOptions {
    /// Interval between keep-alive pings
    pub ping_interval: Duration,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
        }
    }
}

/// Stream projected store broadcasts to a WebSocket client.
///
/// Sends `initial` (if any) first, then `project(action)` for every
/// broadcast action the projection keeps. The projection may keep state,
/// e.g. to drop messages older than one already sent. A lagging client
/// skips the actions it missed and keeps streaming.
///
/// Spawns two concurrent tasks:
/// 1. **Sender**: Stream projected broadcasts (and pings) to the client
/// 2. **Receiver**: Watch the client for close frames
///
/// # Example
///
/// ```ignore
/// async fn ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
///     let rx = state.store.subscribe_actions();
///     let (revision, call) = state.store.state(|s| (s.revision, s.snapshot())).await;
///     let mut feed = BoardFeed::starting_at(revision);
///     ws.on_upgrade(move |socket| {
///         let initial = Some(BoardMessage::from(call));
///         stream_actions(socket, rx, initial, move |a| feed.project(a), StreamOptions::default())
///     })
/// }
/// ```
#[allow(clippy::cognitive_complexity)] // Two tasks with select
pub async fn stream_actions<A, M, F>(
    socket: WebSocket,
    mut actions: broadcast::Receiver<A>,
    initial: Option<M>,
    mut project: F,
    options: StreamOptions,
) where
    A: Clone + Send + 'static,
    M: Serialize + Send + Sync + 'static,
    F: FnMut(&A) -> Option<M> + Send + 'static,
{
    info!("WebSocket connection established");

    // Split socket into sender and receiver
    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        if let Some(message) = initial {
            if send_json(&mut sender, &message).await.is_err() {
                return;
            }
        }

        let period = options.ping_interval;
        let mut keep_alive = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        loop {
            tokio::select! {
                received = actions.recv() => match received {
                    Ok(action) => {
                        let Some(message) = project(&action) else {
                            continue;
                        };
                        if send_json(&mut sender, &message).await.is_err() {
                            // Client disconnected
                            break;
                        }
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "WebSocket client lagged behind broadcasts");
                    },
                    Err(RecvError::Closed) => break,
                },
                _ = keep_alive.tick() => {
                    if sender.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                },
            }
        }

        debug!("WebSocket send task terminated");
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    debug!(len = text.len(), "Ignoring text message from client");
                },
                Message::Binary(_) => {
                    warn!("Received unexpected binary message");
                },
                Message::Ping(_) | Message::Pong(_) => {
                    // Axum answers pings automatically
                },
                Message::Close(_) => {
                    info!("Client requested close");
                    break;
                },
            }
        }

        debug!("WebSocket receive task terminated");
    });

    // Wait for either task to complete (connection closed)
    tokio::select! {
        _ = (&mut send_task) => {
            debug!("Send task completed, aborting receive task");
            recv_task.abort();
        },
        _ = (&mut recv_task) => {
            debug!("Receive task completed, aborting send task");
            send_task.abort();
        },
    }

    info!("WebSocket connection closed");
}

async fn send_json<M, S>(sender: &mut S, message: &M) -> Result<(), ()>
where
    M: Serialize,
    S: Sink<Message> + Unpin,
{
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            error!(error = %e, "Failed to serialize WebSocket message");
            // Skip the message, keep the connection
            return Ok(());
        },
    };

    sender.send(Message::Text(json)).await.map_err(|_| ())
}
