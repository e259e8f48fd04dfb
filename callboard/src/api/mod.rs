//! API endpoints for the queue board.
//!
//! This module contains all HTTP API handlers organized by audience:
//! - Admin: password, venue settings, issuing tickets, scanning, manual calls
//! - User: the current call and one ticket's progress
//! - WebSocket: real-time call updates

pub mod admin;
pub mod user;
pub mod websocket;

pub use admin::{
    aggregate, call_next, call_previous, check_in, check_out, configure_venue, get_range,
    issue_tickets, render_sheet, reset, set_password, set_range, summary,
};
pub use user::{current_call, ticket_status};
pub use websocket::{active_connection_count, call_updates, BoardFeed, BoardMessage};

use crate::call::CallSnapshot;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Json, Query};
use callboard_web::{AppError, WebResult};
use serde::Serialize;

/// Response to an applied command.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    /// Always `"ok"`
    pub status: &'static str,
    /// Board after the command
    #[serde(flatten)]
    pub call: CallSnapshot,
}

impl CommandResponse {
    /// Success with the board as it is now
    #[must_use]
    pub const fn ok(call: CallSnapshot) -> Self {
        Self { status: "ok", call }
    }
}

/// Unwrap a JSON body, turning axum's rejection into a JSON error.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> WebResult<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

/// Unwrap a query string, turning axum's rejection into a JSON error.
pub(crate) fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> WebResult<T> {
    query
        .map(|Query(value)| value)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}
