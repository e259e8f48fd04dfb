//! User API endpoints (rate limited).
//!
//! - GET /user/current - Number being called and the "get ready" list
//! - GET /user/status?ticket=N - Where one ticket stands

use super::query_params;
use crate::call::{CallSnapshot, TicketProgress};
use crate::server::state::AppState;
use crate::types::TicketNumber;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use callboard_web::{AppError, WebResult};
use serde::Deserialize;

/// Query for [`ticket_status`].
#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    /// Ticket number from the ticket link
    pub ticket: u32,
}

/// Number being called and the "get ready" list.
///
/// # Example
///
/// ```bash
/// curl http://localhost:3000/user/current
/// # {"current":12,"notify":[12,13,14]}
/// ```
pub async fn current_call(State(state): State<AppState>) -> Json<CallSnapshot> {
    Json(state.snapshot().await)
}

/// Where one ticket stands in the queue.
///
/// # Errors
///
/// 400 for a missing or malformed `ticket`, 404 for a ticket that was not
/// issued.
pub async fn ticket_status(
    State(state): State<AppState>,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> WebResult<Json<TicketProgress>> {
    let ticket = TicketNumber::new(query_params(query)?.ticket);
    state
        .store
        .state(|s| s.progress(ticket))
        .await
        .map(Json)
        .ok_or_else(|| AppError::not_found("Ticket", ticket))
}
