//! Configuration management for the queue board.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::rate_limit::{DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW};
use crate::types::{SettingsError, VenueSettings, DEFAULT_MAX_INSIDE, DEFAULT_NOTIFY_COUNT};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application server configuration
    pub server: ServerConfig,
    /// Queue board configuration
    pub queue: QueueConfig,
    /// Rate limiting of the user routes
    pub rate_limit: RateLimitConfig,
    /// Ticket sheet configuration
    pub sheet: SheetConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
    /// Directory with the staff and user pages, served as fallback
    pub static_dir: Option<PathBuf>,
}

/// Queue board configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// JSON state file; state is kept in memory only when unset
    pub state_file: Option<PathBuf>,
    /// Venue settings used until an admin changes them
    pub max_inside: u32,
    /// Notify window used until an admin changes it
    pub notify_count: u32,
    /// Admin password seeded on first start
    #[serde(skip_serializing)]
    pub admin_password: Option<String>,
    /// How long a request waits for its command outcome, in milliseconds
    pub command_timeout_ms: u64,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per window and client IP
    pub max_requests: u32,
    /// Window length in seconds
    pub window_secs: u64,
}

/// Ticket sheet configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetConfig {
    /// Public base URL encoded in ticket QR codes
    pub public_url: Option<String>,
    /// TrueType font for captions
    pub font_path: Option<PathBuf>,
}

/// Configuration that cannot be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Initial venue settings out of bounds
    #[error("invalid venue settings: {0}")]
    Venue(#[from] SettingsError),

    /// Rate limit allows nothing
    #[error("rate limit must allow at least one request per window")]
    RateLimit,
}

fn var_path(name: &str) -> Option<PathBuf> {
    env::var(name).ok().filter(|s| !s.trim().is_empty()).map(PathBuf::from)
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable variables fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3000),
                shutdown_timeout: env::var("SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
                static_dir: var_path("CALLBOARD_STATIC_DIR"),
            },
            queue: QueueConfig {
                state_file: var_path("CALLBOARD_STATE_FILE"),
                max_inside: env::var("CALLBOARD_MAX_INSIDE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_MAX_INSIDE),
                notify_count: env::var("CALLBOARD_NOTIFY_COUNT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_NOTIFY_COUNT),
                admin_password: env::var("CALLBOARD_ADMIN_PASSWORD")
                    .ok()
                    .filter(|s| !s.is_empty()),
                command_timeout_ms: env::var("CALLBOARD_COMMAND_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5_000),
            },
            rate_limit: RateLimitConfig {
                max_requests: env::var("CALLBOARD_RATE_LIMIT_REQUESTS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_MAX_REQUESTS),
                window_secs: env::var("CALLBOARD_RATE_LIMIT_WINDOW")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_WINDOW.as_secs()),
            },
            sheet: SheetConfig {
                public_url: env::var("CALLBOARD_PUBLIC_URL")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                font_path: var_path("CALLBOARD_FONT_PATH"),
            },
        }
    }

    /// Check values that parse but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for invalid venue settings or a zero rate limit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.venue_settings()?;
        if self.rate_limit.max_requests == 0 || self.rate_limit.window_secs == 0 {
            return Err(ConfigError::RateLimit);
        }
        Ok(())
    }

    /// Venue settings for a fresh board
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] if the configured values are out of bounds.
    pub fn venue_settings(&self) -> Result<VenueSettings, SettingsError> {
        VenueSettings::new(self.queue.max_inside, self.queue.notify_count)
    }

    /// Rate limit window
    #[must_use]
    pub const fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit.window_secs)
    }

    /// How long a request waits for its command outcome
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.queue.command_timeout_ms)
    }

    /// Address to bind, `host:port`
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                shutdown_timeout: 30,
                static_dir: None,
            },
            queue: QueueConfig {
                state_file: None,
                max_inside: DEFAULT_MAX_INSIDE,
                notify_count: DEFAULT_NOTIFY_COUNT,
                admin_password: None,
                command_timeout_ms: 5_000,
            },
            rate_limit: RateLimitConfig {
                max_requests: DEFAULT_MAX_REQUESTS,
                window_secs: DEFAULT_WINDOW.as_secs(),
            },
            sheet: SheetConfig {
                public_url: None,
                font_path: None,
            },
        }
    }
}
