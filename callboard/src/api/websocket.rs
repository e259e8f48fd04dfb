//! WebSocket endpoint for real-time call updates.
//!
//! # WebSocket Protocol
//!
//! ## Connection
//!
//! ```text
//! ws://localhost:3000/ws
//! ```
//!
//! ## Message Format
//!
//! **Server → Client**, once on connect and again every time the board
//! changes:
//! ```json
//! {
//!   "type": "call_updated",
//!   "current": 12,
//!   "notify": [12, 13, 14]
//! }
//! ```
//!
//! Messages from the client are ignored. The server pings every 30 seconds.

use crate::call::CallSnapshot;
use crate::queue::QueueAction;
use crate::server::state::AppState;
use crate::types::TicketNumber;
use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};
use callboard_web::handlers::{stream_actions, StreamOptions};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

static ACTIVE_CONNECTIONS: AtomicUsize = AtomicUsize::new(0);

/// Open WebSocket connections
#[must_use]
pub fn active_connection_count() -> usize {
    ACTIVE_CONNECTIONS.load(Ordering::Relaxed)
}

struct ConnectionGuard;

impl ConnectionGuard {
    fn open() -> Self {
        let open = ACTIVE_CONNECTIONS.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(open, "Board viewer connected");
        Self
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let open = ACTIVE_CONNECTIONS.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
        tracing::debug!(open, "Board viewer disconnected");
    }
}

/// Message pushed to board viewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoardMessage {
    /// The call changed
    CallUpdated {
        /// Number being called
        current: Option<TicketNumber>,
        /// "Get ready" list
        notify: Vec<TicketNumber>,
    },
}

impl From<CallSnapshot> for BoardMessage {
    fn from(call: CallSnapshot) -> Self {
        Self::CallUpdated {
            current: call.current,
            notify: call.notify,
        }
    }
}

/// Turns store broadcasts into messages for one viewer.
///
/// Call changes are broadcast from concurrent effects and may arrive out of
/// order. The feed only passes on a change newer than the last board the
/// viewer was sent, so a viewer always ends on the current call.
#[derive(Debug, Clone, Copy)]
pub struct BoardFeed {
    revision: u64,
}

impl BoardFeed {
    /// Feed for a viewer whose first message showed the board at `revision`.
    #[must_use]
    pub const fn starting_at(revision: u64) -> Self {
        Self { revision }
    }

    /// Message for a store broadcast, if the viewer still needs it
    pub fn project(&mut self, action: &QueueAction) -> Option<BoardMessage> {
        match action {
            QueueAction::CallChanged { revision, call } if *revision > self.revision => {
                self.revision = *revision;
                Some(BoardMessage::from(call.clone()))
            },
            _ => None,
        }
    }
}

/// Upgrade to a WebSocket streaming call updates.
pub async fn call_updates(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    // Subscribe before reading the board so no change falls in between
    let actions = state.store.subscribe_actions();
    let (revision, call) = state.store.state(|s| (s.revision, s.snapshot())).await;
    let mut feed = BoardFeed::starting_at(revision);

    ws.on_upgrade(move |socket| async move {
        let _guard = ConnectionGuard::open();
        stream_actions(
            socket,
            actions,
            Some(BoardMessage::from(call)),
            move |action| feed.project(action),
            StreamOptions::default(),
        )
        .await;
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_message_shape() {
        let message = BoardMessage::from(CallSnapshot {
            current: Some(TicketNumber::new(12)),
            notify: vec![TicketNumber::new(12), TicketNumber::new(13)],
        });
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            serde_json::json!({"type": "call_updated", "current": 12, "notify": [12, 13]})
        );

        let empty = BoardMessage::from(CallSnapshot::default());
        assert_eq!(
            serde_json::to_value(&empty).unwrap(),
            serde_json::json!({"type": "call_updated", "current": null, "notify": []})
        );
    }

    fn changed(revision: u64, current: u32) -> QueueAction {
        QueueAction::CallChanged {
            revision,
            call: CallSnapshot {
                current: Some(TicketNumber::new(current)),
                notify: vec![TicketNumber::new(current)],
            },
        }
    }

    #[test]
    fn test_only_call_changes_are_projected() {
        let mut feed = BoardFeed::starting_at(0);

        assert!(feed
            .project(&QueueAction::CommandApplied {
                request_id: Uuid::new_v4()
            })
            .is_none());
        assert!(feed.project(&QueueAction::SnapshotSaved { revision: 1 }).is_none());
        assert!(feed.project(&changed(1, 4)).is_some());
    }

    #[test]
    fn test_feed_drops_changes_older_than_the_last_one_sent() {
        let mut feed = BoardFeed::starting_at(3);

        // Already part of the board the viewer got on connect
        assert!(feed.project(&changed(3, 5)).is_none());

        assert_eq!(feed.project(&changed(6, 8)), Some(BoardMessage::from(CallSnapshot {
            current: Some(TicketNumber::new(8)),
            notify: vec![TicketNumber::new(8)],
        })));
        // Effects of revisions 4 and 5 finishing late
        assert!(feed.project(&changed(5, 7)).is_none());
        assert!(feed.project(&changed(4, 6)).is_none());
        assert!(feed.project(&changed(7, 9)).is_some());
    }
}
