//! Health, readiness and metrics endpoints.

use crate::queue::{QueueAction, QueueEnvironment, QueueReducer, QueueState};
use crate::server::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use callboard_runtime::{HealthCheck, HealthStatus};
use callboard_web::handlers::health_check_with_store;
use serde::Serialize;

pub use callboard_web::handlers::health_check;

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    /// Overall readiness
    pub ready: bool,
    /// Store health
    pub store: HealthCheck,
    /// Snapshot writes
    pub persistence: HealthCheck,
}

/// Readiness check endpoint.
///
/// Not ready once the store is shutting down. A failing snapshot write
/// degrades readiness without failing it: the board keeps working from
/// memory.
///
/// # Example
///
/// ```bash
/// curl http://localhost:3000/ready
/// ```
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let (_, Json(store)) =
        health_check_with_store::<QueueState, QueueAction, QueueEnvironment, QueueReducer>(State(
            state.store.clone(),
        ))
        .await;

    let persistence = match state.store.state(|s| s.last_persist_error.clone()).await {
        None => HealthCheck::healthy("persistence"),
        Some(error) => HealthCheck::degraded("persistence", error),
    };

    let ready = store.status != HealthStatus::Unhealthy;
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            ready,
            store,
            persistence,
        }),
    )
}

/// Prometheus metrics in text format.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
