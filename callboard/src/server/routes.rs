//! Router configuration for the queue board.
//!
//! Builds the complete Axum router with all endpoints.

use super::health::{health_check, metrics, readiness_check};
use super::state::AppState;
use crate::api::{admin, user, websocket};
use crate::auth::require_admin;
use crate::rate_limit::{rate_limit, RateLimiter};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use callboard_web::correlation_id_layer;
use std::path::Path;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// - `/admin/*`: password guarded
/// - `/user/*`: rate limited per client IP
/// - `/ws`: call updates
/// - `/health`, `/ready`, `/metrics`: operational
/// - everything else: the static directory, when configured
pub fn build_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/admin/password", post(admin::set_password))
        .route("/admin/venue", post(admin::configure_venue))
        .route("/admin/range", get(admin::get_range).post(admin::set_range))
        .route("/admin/issue", post(admin::issue_tickets))
        .route("/admin/sheet", post(admin::render_sheet))
        .route("/admin/checkin", post(admin::check_in))
        .route("/admin/checkout", post(admin::check_out))
        .route("/admin/next", post(admin::call_next))
        .route("/admin/prev", post(admin::call_previous))
        .route("/admin/reset", post(admin::reset))
        .route("/admin/aggregate", get(admin::aggregate))
        .route("/admin/summary", get(admin::summary))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let user_routes = Router::new()
        .route("/user/current", get(user::current_call))
        .route("/user/status", get(user::ticket_status))
        .route_layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit,
        ));

    let mut router = Router::new()
        // Health checks (no authentication)
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics))
        .route("/ws", get(websocket::call_updates))
        .merge(admin_routes)
        .merge(user_routes);

    if let Some(dir) = state.config.server.static_dir.clone() {
        router = with_static_pages(router, &dir, &state.rate_limiter);
    }

    router
        .with_state(state)
        .layer(correlation_id_layer())
        .layer(TraceLayer::new_for_http())
}

/// Serve the staff and user pages.
///
/// `/user` (the target of the ticket links) serves `user.html` and is rate
/// limited like the user API; `/admin` serves `admin.html`. Any other path
/// is looked up in the directory.
fn with_static_pages(
    router: Router<AppState>,
    dir: &Path,
    limiter: &RateLimiter,
) -> Router<AppState> {
    tracing::info!(dir = %dir.display(), "Serving static pages");
    let user_page = Router::new()
        .route_service("/user", ServeFile::new(dir.join("user.html")))
        .route_layer(middleware::from_fn_with_state(limiter.clone(), rate_limit));

    router
        .merge(user_page)
        .route_service("/admin", ServeFile::new(dir.join("admin.html")))
        .fallback_service(ServeDir::new(dir).append_index_html_on_directories(true))
}
