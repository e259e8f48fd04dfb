//! Error types for web handlers.
//!
//! [`AppError`] carries a status, a stable machine-readable code and a
//! user-facing message, and renders as `{"code": .., "message": ..}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use callboard_runtime::StoreError;
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
///
/// ```ignore
/// async fn status(Query(q): Query<StatusQuery>) -> Result<Json<TicketProgress>, AppError> {
///     let progress = board.progress(q.ticket)
///         .ok_or_else(|| AppError::not_found("Ticket", q.ticket))?;
///     Ok(Json(progress))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
    /// Logged for server errors, never sent to the client
    source: Option<anyhow::Error>,
}

macro_rules! constructors {
    ($($(#[$doc:meta])* $name:ident => $status:ident, $code:literal;)*) => {
        $(
            $(#[$doc])*
            #[must_use]
            pub fn $name(message: impl Into<String>) -> Self {
                Self::new(StatusCode::$status, $code, message)
            }
        )*
    };
}

impl AppError {
    /// Error with an explicit status and code.
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying error for the log line.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    constructors! {
        /// 400: the request cannot be parsed.
        bad_request => BAD_REQUEST, "BAD_REQUEST";
        /// 401: missing or wrong admin password.
        unauthorized => UNAUTHORIZED, "UNAUTHORIZED";
        /// 409: the request contradicts the current state.
        conflict => CONFLICT, "CONFLICT";
        /// 422: well-formed but invalid values.
        validation => UNPROCESSABLE_ENTITY, "VALIDATION_ERROR";
        /// 408: the command outcome did not arrive in time.
        timeout => REQUEST_TIMEOUT, "TIMEOUT";
        /// 429: rate limited.
        too_many_requests => TOO_MANY_REQUESTS, "TOO_MANY_REQUESTS";
        /// 500.
        internal => INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR";
        /// 503: shutting down.
        unavailable => SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE";
    }

    /// 404 for a missing `resource` with the given id.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{resource} with id {id} not found"),
        )
    }

    /// HTTP status this error responds with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            let source = self.source.as_ref().map(ToString::to_string);
            tracing::error!(
                status = %self.status,
                code = self.code,
                message = %self.message,
                error = source.as_deref().unwrap_or("none"),
                "Internal server error"
            );
        }

        let body = ErrorBody {
            code: self.code,
            message: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Convert store failures to `AppError`.
impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ShutdownInProgress => Self::unavailable("Service is shutting down"),
            StoreError::Timeout => Self::timeout("Timed out waiting for the command to complete"),
            other => Self::internal("An internal error occurred").with_source(other.into()),
        }
    }
}

/// Convert `anyhow::Error` to `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}
