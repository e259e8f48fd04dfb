//! Callboard Server
//!
//! Runs the queue board: HTTP API, WebSocket call updates and the static
//! staff and user pages.
//!
//! # Usage
//!
//! ```bash
//! CALLBOARD_STATE_FILE=./state.json \
//! CALLBOARD_ADMIN_PASSWORD=secret \
//! CALLBOARD_STATIC_DIR=./public \
//! cargo run --bin server
//! ```

use callboard::{metrics::register_business_metrics, CallboardApp, Config};
use callboard_runtime::metrics::MetricsRecorder;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,callboard=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Callboard server...");

    // Load configuration
    let config = Config::from_env();
    tracing::info!(
        address = %config.bind_address(),
        state_file = ?config.queue.state_file,
        static_dir = ?config.server.static_dir,
        public_url = ?config.sheet.public_url,
        "Configuration loaded"
    );

    let metrics = MetricsRecorder::install()?;
    register_business_metrics();

    let app = CallboardApp::new(config, metrics).await?;
    tracing::info!("Application initialized, press Ctrl+C to shut down");

    app.serve().await?;
    Ok(())
}
