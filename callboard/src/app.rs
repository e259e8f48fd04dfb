//! Application coordinator: wires configuration, persistence, the queue
//! store and the HTTP server together.

use crate::auth::PasswordDigest;
use crate::config::{Config, ConfigError};
use crate::persistence::{InMemorySnapshotStore, JsonFileSnapshotStore, PersistenceError, SnapshotStore};
use crate::queue::{QueueEnvironment, QueueReducer, QueueState, QueueStore};
use crate::rate_limit::RateLimiter;
use crate::server::{build_router, AppState};
use axum::Router;
use callboard_core::environment::{Clock, SystemClock};
use callboard_runtime::metrics::{MetricsError, MetricsRecorder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Actions buffered per observer; display screens read slowly.
const ACTION_BROADCAST_CAPACITY: usize = 256;

/// Application errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration cannot be used
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The state file could not be loaded
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Metrics recorder could not be set up
    #[error("Metrics error: {0}")]
    Metrics(#[from] MetricsError),

    /// Binding or serving failed
    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Main queue board application.
pub struct CallboardApp {
    config: Arc<Config>,
    store: QueueStore,
    rate_limiter: RateLimiter,
    metrics: MetricsRecorder,
}

impl CallboardApp {
    /// Build the application: load the last snapshot and start the store.
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] for invalid configuration or an unreadable state
    /// file.
    pub async fn new(config: Config, metrics: MetricsRecorder) -> Result<Self, AppError> {
        config.validate()?;

        let snapshots: Arc<dyn SnapshotStore> = match &config.queue.state_file {
            Some(path) => {
                tracing::info!(path = %path.display(), "Persisting queue state to file");
                Arc::new(JsonFileSnapshotStore::new(path))
            },
            None => {
                tracing::warn!("CALLBOARD_STATE_FILE not set, queue state lives in memory only");
                Arc::new(InMemorySnapshotStore::new())
            },
        };

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let initial = Self::initial_state(&config, snapshots.as_ref()).await?;
        tracing::info!(
            range = ?initial.range,
            called = initial.called,
            inside = initial.inside(),
            revision = initial.revision,
            "Queue state ready"
        );

        let store = QueueStore::with_broadcast_capacity(
            initial,
            QueueReducer::new(),
            QueueEnvironment::new(Arc::clone(&clock), snapshots),
            ACTION_BROADCAST_CAPACITY,
        );

        let rate_limiter = RateLimiter::new(
            config.rate_limit.max_requests,
            config.rate_limit_window(),
            clock,
        );

        Ok(Self {
            config: Arc::new(config),
            store,
            rate_limiter,
            metrics,
        })
    }

    /// Last snapshot, repaired, with the configured password seeded when
    /// none was ever set.
    async fn initial_state(
        config: &Config,
        snapshots: &dyn SnapshotStore,
    ) -> Result<QueueState, AppError> {
        let mut state = match snapshots.load().await? {
            Some(state) => state.sanitized(),
            None => QueueState {
                settings: config.venue_settings().map_err(ConfigError::from)?,
                ..QueueState::default()
            },
        };

        if state.admin_password.is_none() {
            if let Some(password) = &config.queue.admin_password {
                tracing::info!("Admin password seeded from configuration");
                state.admin_password = Some(PasswordDigest::of(password));
            }
        }
        if state.admin_password.is_none() {
            tracing::warn!("No admin password set, admin routes are open until one is");
        }

        Ok(state)
    }

    /// The application router
    #[must_use]
    pub fn router(&self) -> Router {
        build_router(AppState::new(
            self.store.clone(),
            self.rate_limiter.clone(),
            self.metrics.clone(),
            Arc::clone(&self.config),
        ))
    }

    /// The queue store
    #[must_use]
    pub const fn store(&self) -> &QueueStore {
        &self.store
    }

    /// Serve HTTP until Ctrl+C, then drain pending effects.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] if the address cannot be bound or serving
    /// fails.
    pub async fn serve(self) -> Result<(), AppError> {
        let address = self.config.bind_address();
        let listener = tokio::net::TcpListener::bind(&address).await?;
        tracing::info!(address = %address, "Callboard listening");

        let sweeper = self.spawn_rate_limit_sweeper();

        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        sweeper.abort();

        let timeout = Duration::from_secs(self.config.server.shutdown_timeout);
        tracing::info!(timeout_secs = timeout.as_secs(), "Draining pending effects");
        if let Err(e) = self.store.shutdown(timeout).await {
            tracing::warn!(error = %e, "Store shutdown incomplete");
        }

        tracing::info!("Callboard stopped");
        Ok(())
    }

    fn spawn_rate_limit_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let limiter = self.rate_limiter.clone();
        let period = self.config.rate_limit_window();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let removed = limiter.sweep();
                if removed > 0 {
                    tracing::debug!(removed, "Dropped idle rate limit entries");
                }
            }
        })
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
