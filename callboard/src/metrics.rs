//! Business metrics for the queue board.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `callboard_commands_total{command}` - Applied commands by kind
//! - `callboard_rejections_total{reason}` - Rejected commands by reason
//! - `callboard_snapshot_failures_total` - Snapshot writes that failed after retries
//! - `callboard_rate_limited_total` - Requests refused by the rate limiter
//! - `callboard_sheets_rendered_total` - PDF ticket sheets produced
//!
//! ## Gauges
//! - `callboard_people_inside` - Checked in and not yet checked out
//! - `callboard_tickets_called` - Tickets called so far
//! - `callboard_tickets_issued` - Tickets in the issued range
//!
//! ## Histograms
//! - `callboard_sheet_render_duration_seconds` - Time to render a PDF sheet

use metrics::{describe_counter, describe_gauge, describe_histogram};
use std::time::Duration;

/// Initialize and register all business metrics descriptions.
///
/// This should be called once at application startup, after the recorder is installed.
pub fn register_business_metrics() {
    describe_counter!(
        "callboard_commands_total",
        "Total number of applied queue commands by kind"
    );
    describe_counter!(
        "callboard_rejections_total",
        "Total number of rejected queue commands by reason"
    );
    describe_counter!(
        "callboard_snapshot_failures_total",
        "Snapshot writes that failed after retries"
    );
    describe_counter!(
        "callboard_rate_limited_total",
        "Requests refused by the rate limiter"
    );
    describe_counter!(
        "callboard_sheets_rendered_total",
        "Total number of PDF ticket sheets rendered"
    );

    describe_gauge!(
        "callboard_people_inside",
        "People checked in and not yet checked out"
    );
    describe_gauge!("callboard_tickets_called", "Tickets called so far");
    describe_gauge!("callboard_tickets_issued", "Tickets in the issued range");

    describe_histogram!(
        "callboard_sheet_render_duration_seconds",
        "Time taken to render a PDF ticket sheet"
    );

    tracing::info!("Business metrics registered");
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record an applied command.
pub fn record_command(command: &'static str) {
    metrics::counter!("callboard_commands_total", "command" => command).increment(1);
}

/// Record a rejected command.
pub fn record_rejection(reason: &'static str) {
    metrics::counter!("callboard_rejections_total", "reason" => reason).increment(1);
    tracing::debug!(reason, "Recorded rejection metric");
}

/// Update the occupancy gauges.
#[allow(clippy::cast_precision_loss)] // Ticket counts stay far below f64 precision
pub fn update_occupancy(inside: u32, called: u32, issued: u32) {
    metrics::gauge!("callboard_people_inside").set(f64::from(inside));
    metrics::gauge!("callboard_tickets_called").set(f64::from(called));
    metrics::gauge!("callboard_tickets_issued").set(f64::from(issued));
}

/// Record a snapshot write that gave up.
pub fn record_snapshot_failed() {
    metrics::counter!("callboard_snapshot_failures_total").increment(1);
}

/// Record a rate-limited request.
pub fn record_rate_limited() {
    metrics::counter!("callboard_rate_limited_total").increment(1);
}

/// Record a rendered ticket sheet.
///
/// # Arguments
///
/// * `tickets` - Number of tickets on the sheet
/// * `duration` - Render time
pub fn record_sheet_rendered(tickets: u32, duration: Duration) {
    metrics::counter!("callboard_sheets_rendered_total").increment(1);
    metrics::histogram!("callboard_sheet_render_duration_seconds").record(duration.as_secs_f64());
    tracing::debug!(tickets, duration_ms = duration.as_millis(), "Recorded sheet_rendered metric");
}
