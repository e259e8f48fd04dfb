//! Admin API endpoints.
//!
//! Every route here sits behind [`crate::auth::require_admin`]:
//! - POST /admin/password - Set or change the admin password
//! - POST /admin/venue - Capacity and notify window
//! - GET /admin/range, POST /admin/range - Read or set the issued range
//! - POST /admin/issue - Set the range and download the ticket sheet
//! - POST /admin/sheet - Download a ticket sheet without touching the queue
//! - POST /admin/checkin, POST /admin/checkout - Scanned tickets
//! - POST /admin/next, POST /admin/prev - Manual call override
//! - POST /admin/reset - Clear the queue
//! - GET /admin/aggregate, GET /admin/summary - Counts for the staff page

use super::{json_body, CommandResponse};
use crate::auth::PasswordDigest;
use crate::queue::{QueueAction, QueueSummary};
use crate::server::state::AppState;
use crate::sheet::{self, SheetOptions};
use crate::types::{TicketNumber, TicketRange, VenueSettings};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use callboard_web::{AppError, WebResult};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Numbers from the staff pages arrive as JSON numbers or as strings; like
/// the form they come from, anything after the leading digits is ignored and
/// a value without digits counts as missing.
fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        serde_json::Value::String(s) => {
            let digits: String = s.trim().chars().take_while(char::is_ascii_digit).collect();
            digits.parse().ok()
        },
        _ => None,
    }))
}

/// Request to set the admin password.
#[derive(Debug, Deserialize)]
pub struct PasswordRequest {
    /// New password
    pub password: String,
}

/// Request to change the venue settings.
///
/// Missing or zero values fall back to the defaults.
#[derive(Debug, Default, Deserialize)]
pub struct VenueRequest {
    /// How many people may be inside at once
    #[serde(default, deserialize_with = "lenient_u32", alias = "maxInside", alias = "maxVenue")]
    pub max_inside: Option<u32>,
    /// How many numbers the "get ready" list shows
    #[serde(default, deserialize_with = "lenient_u32", alias = "notifyCount")]
    pub notify_count: Option<u32>,
}

/// A ticket range, as `"start-end"` text or as separate bounds.
#[derive(Debug, Default, Deserialize)]
pub struct RangeRequest {
    /// Range as text, e.g. `"1-100"`
    pub range: Option<String>,
    /// First ticket
    #[serde(default, deserialize_with = "lenient_u32")]
    pub start: Option<u32>,
    /// Last ticket
    #[serde(default, deserialize_with = "lenient_u32")]
    pub end: Option<u32>,
    /// Base URL for the ticket links, overriding the configured one
    #[serde(alias = "siteURL", alias = "siteUrl")]
    pub site_url: Option<String>,
}

impl RangeRequest {
    /// The requested range.
    ///
    /// # Errors
    ///
    /// 400 when neither form is present, 422 when the range is invalid.
    pub fn ticket_range(&self) -> WebResult<TicketRange> {
        let parsed = match (&self.range, self.start, self.end) {
            (Some(text), _, _) => text.parse(),
            (None, Some(start), Some(end)) => TicketRange::new(start, end),
            _ => {
                return Err(AppError::bad_request(
                    "Expected \"range\" or both \"start\" and \"end\"",
                ))
            },
        };
        parsed.map_err(|e| AppError::validation(e.to_string()))
    }
}

/// A scanned or typed ticket.
#[derive(Debug, Default, Deserialize)]
pub struct ScanRequest {
    /// Ticket number
    #[serde(default, deserialize_with = "lenient_u32", alias = "number")]
    pub ticket: Option<u32>,
    /// Raw QR payload
    pub code: Option<String>,
}

impl ScanRequest {
    /// The ticket this request names.
    ///
    /// # Errors
    ///
    /// 400 when no ticket can be read from the request.
    pub fn ticket_number(&self) -> WebResult<TicketNumber> {
        let valid = |n: &u32| *n > 0;
        self.ticket
            .filter(valid)
            .or_else(|| self.code.as_deref().and_then(parse_scanned_code).filter(valid))
            .map(TicketNumber::new)
            .ok_or_else(|| AppError::bad_request("No ticket number in request"))
    }
}

/// Read a ticket number from a QR payload.
///
/// Back-side codes hold the bare number; a front-side code holds the user
/// page URL with the number in its `ticket` (or `number`) parameter.
#[must_use]
pub fn parse_scanned_code(code: &str) -> Option<u32> {
    let code = code.trim();
    if let Ok(number) = code.parse() {
        return Some(number);
    }

    let without_fragment = code.split('#').next().unwrap_or(code);
    let (_, query) = without_fragment.split_once('?')?;
    let params: HashMap<String, String> = serde_urlencoded::from_str(query).ok()?;
    params
        .get("ticket")
        .or_else(|| params.get("number"))
        .and_then(|n| n.trim().parse().ok())
}

/// Current issued range.
#[derive(Debug, Serialize)]
pub struct RangeResponse {
    /// Issued range, `null` before the first issue
    pub range: Option<TicketRange>,
}

/// Check-in and check-out lists.
#[derive(Debug, Serialize)]
pub struct AggregateResponse {
    /// Number being called, `null` when none
    pub current: Option<TicketNumber>,
    /// Tickets that checked in
    pub checked_in: Vec<TicketNumber>,
    /// Tickets that checked out
    pub checked_out: Vec<TicketNumber>,
}

/// Admin summary.
#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    /// Queue counts
    #[serde(flatten)]
    pub summary: QueueSummary,
    /// Open WebSocket connections
    pub viewers: usize,
}

/// Response to a scan.
#[derive(Debug, Serialize)]
pub struct ScanResponse {
    /// Always `"ok"`
    pub status: &'static str,
    /// Ticket scanned
    pub ticket: TicketNumber,
    /// People inside after the scan
    pub inside: u32,
    /// Board after the scan
    #[serde(flatten)]
    pub call: crate::call::CallSnapshot,
}

// ============================================================================
// Handlers
// ============================================================================

/// Set or change the admin password.
///
/// While no password is set this route is open; afterwards the current
/// password must be presented in `X-Admin-Password` like on every admin
/// route.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:3000/admin/password \
///   -H "Content-Type: application/json" \
///   -d '{"password": "s3cret"}'
/// ```
///
/// # Errors
///
/// 422 for an empty password.
pub async fn set_password(
    State(state): State<AppState>,
    body: Result<Json<PasswordRequest>, JsonRejection>,
) -> WebResult<Json<CommandResponse>> {
    let request = json_body(body)?;
    if request.password.is_empty() {
        return Err(AppError::validation("Password must not be empty"));
    }

    let digest = PasswordDigest::of(&request.password);
    let request_id = state
        .dispatch(|request_id| QueueAction::SetPassword { request_id, digest })
        .await?;

    tracing::info!(%request_id, "Admin password changed");
    Ok(Json(CommandResponse::ok(state.snapshot().await)))
}

/// Change capacity and notify window.
///
/// # Errors
///
/// 422 for a notify window above the maximum.
pub async fn configure_venue(
    State(state): State<AppState>,
    body: Result<Json<VenueRequest>, JsonRejection>,
) -> WebResult<Json<CommandResponse>> {
    let request = json_body(body)?;
    let settings = VenueSettings::from_form(request.max_inside, request.notify_count)
        .map_err(|e| AppError::validation(e.to_string()))?;

    state
        .dispatch(|request_id| QueueAction::ConfigureVenue {
            request_id,
            settings,
        })
        .await?;

    Ok(Json(CommandResponse::ok(state.snapshot().await)))
}

/// Current issued range.
pub async fn get_range(State(state): State<AppState>) -> Json<RangeResponse> {
    let range = state.store.state(|s| s.range).await;
    Json(RangeResponse { range })
}

/// Set the issued range without producing a sheet.
///
/// # Errors
///
/// 400/422 for a missing or invalid range.
pub async fn set_range(
    State(state): State<AppState>,
    body: Result<Json<RangeRequest>, JsonRejection>,
) -> WebResult<Json<CommandResponse>> {
    let range = json_body(body)?.ticket_range()?;

    let request_id = state
        .dispatch(|request_id| QueueAction::IssueTickets { request_id, range })
        .await?;

    tracing::info!(%request_id, %range, "Ticket range set");
    Ok(Json(CommandResponse::ok(state.snapshot().await)))
}

/// Start a new queue and download its ticket sheet.
///
/// The sheet is rendered before the queue changes, so a failed render leaves
/// the running queue alone.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:3000/admin/issue \
///   -H "X-Admin-Password: s3cret" \
///   -H "Content-Type: application/json" \
///   -d '{"start": 1, "end": 100}' -o tickets.pdf
/// ```
///
/// # Errors
///
/// 400/422 for a missing or invalid range, 500 if the sheet cannot be
/// rendered.
pub async fn issue_tickets(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<RangeRequest>, JsonRejection>,
) -> WebResult<Response> {
    let request = json_body(body)?;
    let range = request.ticket_range()?;
    let pdf = render(&state, &headers, &request, range).await?;

    let request_id = state
        .dispatch(|request_id| QueueAction::IssueTickets { request_id, range })
        .await?;

    tracing::info!(%request_id, %range, "Tickets issued");
    Ok(pdf_response(pdf))
}

/// Download a ticket sheet without touching the queue.
///
/// # Errors
///
/// 400/422 for a missing or invalid range, 500 if the sheet cannot be
/// rendered.
pub async fn render_sheet(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<RangeRequest>, JsonRejection>,
) -> WebResult<Response> {
    let request = json_body(body)?;
    let range = request.ticket_range()?;
    let pdf = render(&state, &headers, &request, range).await?;
    Ok(pdf_response(pdf))
}

async fn render(
    state: &AppState,
    headers: &HeaderMap,
    request: &RangeRequest,
    range: TicketRange,
) -> WebResult<Vec<u8>> {
    let host = headers.get(header::HOST).and_then(|v| v.to_str().ok());
    let explicit = request
        .site_url
        .as_deref()
        .or(state.config.sheet.public_url.as_deref());
    let base_url = sheet::resolve_base_url(explicit, host, state.config.server.port);
    let options = SheetOptions::new(&base_url).with_font(state.config.sheet.font_path.clone());

    tokio::task::spawn_blocking(move || sheet::render_sheet(&range, &options))
        .await
        .map_err(|e| AppError::internal("Sheet rendering was interrupted").with_source(e.into()))?
        .map_err(|e| {
            tracing::error!(error = %e, %range, "Failed to render ticket sheet");
            AppError::internal("Failed to render ticket sheet").with_source(e.into())
        })
}

fn pdf_response(pdf: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (
                header::CONTENT_DISPOSITION,
                HeaderValue::from_static("attachment; filename=\"tickets.pdf\""),
            ),
        ],
        pdf,
    )
        .into_response()
}

/// Check a ticket in.
///
/// # Errors
///
/// 400 without a readable ticket, 404 outside the issued range, 409 with no
/// range or after check-out.
pub async fn check_in(
    State(state): State<AppState>,
    body: Result<Json<ScanRequest>, JsonRejection>,
) -> WebResult<Json<ScanResponse>> {
    let ticket = json_body(body)?.ticket_number()?;
    state
        .dispatch(|request_id| QueueAction::CheckIn { request_id, ticket })
        .await?;
    Ok(scan_response(&state, ticket).await)
}

/// Check a ticket out.
///
/// # Errors
///
/// 400 without a readable ticket, 404 outside the issued range, 409 with no
/// range or without a check-in.
pub async fn check_out(
    State(state): State<AppState>,
    body: Result<Json<ScanRequest>, JsonRejection>,
) -> WebResult<Json<ScanResponse>> {
    let ticket = json_body(body)?.ticket_number()?;
    state
        .dispatch(|request_id| QueueAction::CheckOut { request_id, ticket })
        .await?;
    Ok(scan_response(&state, ticket).await)
}

async fn scan_response(state: &AppState, ticket: TicketNumber) -> Json<ScanResponse> {
    let (inside, call) = state.store.state(|s| (s.inside(), s.snapshot())).await;
    Json(ScanResponse {
        status: "ok",
        ticket,
        inside,
        call,
    })
}

/// Call one more number.
///
/// # Errors
///
/// 409 when no tickets are issued.
pub async fn call_next(
    State(state): State<AppState>,
) -> WebResult<Json<CommandResponse>> {
    state
        .dispatch(|request_id| QueueAction::CallNext { request_id })
        .await?;
    Ok(Json(CommandResponse::ok(state.snapshot().await)))
}

/// Step the call back one number.
///
/// # Errors
///
/// 409 when no tickets are issued.
pub async fn call_previous(
    State(state): State<AppState>,
) -> WebResult<Json<CommandResponse>> {
    state
        .dispatch(|request_id| QueueAction::CallPrevious { request_id })
        .await?;
    Ok(Json(CommandResponse::ok(state.snapshot().await)))
}

/// Clear the queue. Password and settings stay.
///
/// # Errors
///
/// Only store failures.
pub async fn reset(
    State(state): State<AppState>,
) -> WebResult<Json<CommandResponse>> {
    let request_id = state
        .dispatch(|request_id| QueueAction::Reset { request_id })
        .await?;
    tracing::info!(%request_id, "Queue reset");
    Ok(Json(CommandResponse::ok(state.snapshot().await)))
}

/// Current call with the check-in and check-out lists.
pub async fn aggregate(State(state): State<AppState>) -> Json<AggregateResponse> {
    let response = state
        .store
        .state(|s| AggregateResponse {
            current: s.snapshot().current,
            checked_in: s.checked_in.iter().copied().collect(),
            checked_out: s.checked_out.iter().copied().collect(),
        })
        .await;
    Json(response)
}

/// Counts for the staff page.
pub async fn summary(State(state): State<AppState>) -> Json<SummaryResponse> {
    let summary = state.store.state(crate::queue::QueueState::summary).await;
    Json(SummaryResponse {
        summary,
        viewers: super::active_connection_count(),
    })
}
