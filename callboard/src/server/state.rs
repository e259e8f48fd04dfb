//! Application state for the HTTP server.
//!
//! Contains all shared resources needed by HTTP handlers:
//! - The queue store (commands and state reads)
//! - The rate limiter guarding the user routes
//! - The Prometheus handle for `/metrics`
//! - Configuration

use crate::call::CallSnapshot;
use crate::config::Config;
use crate::queue::{QueueAction, QueueStore, Rejection};
use crate::rate_limit::RateLimiter;
use axum::extract::FromRef;
use callboard_runtime::metrics::MetricsRecorder;
use callboard_web::AppError;
use std::sync::Arc;
use uuid::Uuid;

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request; every field is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    /// Queue store
    pub store: QueueStore,
    /// Limiter for the user routes
    pub rate_limiter: RateLimiter,
    /// Prometheus metrics
    pub metrics: MetricsRecorder,
    /// Configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(
        store: QueueStore,
        rate_limiter: RateLimiter,
        metrics: MetricsRecorder,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store,
            rate_limiter,
            metrics,
            config,
        }
    }

    /// Send a command and wait until the reducer applied or rejected it.
    ///
    /// `command` is built around a request ID generated here, never one the
    /// client supplied: outcomes are matched on it, so overlapping requests
    /// cannot pick up each other's outcome. Returns that ID.
    ///
    /// # Errors
    ///
    /// Returns the HTTP error for a rejection, or for a store that is
    /// shutting down or did not answer in time.
    pub async fn dispatch<F>(&self, command: F) -> Result<Uuid, AppError>
    where
        F: FnOnce(Uuid) -> QueueAction,
    {
        let request_id = Uuid::new_v4();
        let command = command(request_id);
        if command.request_id() != Some(request_id) {
            tracing::error!(?command, "Command built without its request ID");
            return Err(AppError::internal("Only commands can be dispatched"));
        }

        let outcome = self
            .store
            .send_and_wait_for(
                command,
                move |action| action.is_outcome_of(request_id),
                self.config.command_timeout(),
            )
            .await?;

        match outcome {
            QueueAction::CommandApplied { .. } => Ok(request_id),
            QueueAction::CommandRejected { rejection, .. } => Err(rejection_error(&rejection)),
            other => {
                tracing::error!(?other, %request_id, "Unexpected command outcome");
                Err(AppError::internal("Unexpected command outcome"))
            },
        }
    }

    /// What the user board shows now
    pub async fn snapshot(&self) -> CallSnapshot {
        self.store.state(crate::queue::QueueState::snapshot).await
    }
}

/// HTTP error for a rejected command.
#[must_use]
pub fn rejection_error(rejection: &Rejection) -> AppError {
    match rejection {
        Rejection::NoTicketsIssued
        | Rejection::AlreadyCheckedOut(_)
        | Rejection::NotCheckedIn(_) => AppError::conflict(rejection.to_string()),
        Rejection::OutOfRange { ticket, .. } => AppError::not_found("Ticket", ticket),
        Rejection::InvalidSettings(e) => AppError::validation(e.to_string()),
    }
}

impl FromRef<AppState> for QueueStore {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.store.clone()
    }
}

impl FromRef<AppState> for RateLimiter {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.rate_limiter.clone()
    }
}

impl FromRef<AppState> for MetricsRecorder {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.metrics.clone()
    }
}
