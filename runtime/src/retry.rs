//! Retries with exponential backoff.
//!
//! Effects that touch the disk (the queue snapshot writer) retry transient
//! failures a few times before reporting them back to the reducer.
//!
//! # Example
//!
//! ```rust
//! use callboard_runtime::retry::{retry_with_predicate, RetryPolicy};
//! use std::time::Duration;
//!
//! # async fn example() -> std::io::Result<()> {
//! let policy = RetryPolicy::builder()
//!     .max_retries(4)
//!     .initial_delay(Duration::from_millis(25))
//!     .build();
//!
//! retry_with_predicate(
//!     policy,
//!     "snapshot_save",
//!     || tokio::fs::write("state.json.tmp", b"{}"),
//!     |e: &std::io::Error| e.kind() != std::io::ErrorKind::PermissionDenied,
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::metrics::RetryMetrics;
use std::future::Future;
use std::time::Duration;

/// How often and how patiently to retry.
///
/// Defaults: 3 retries, 100ms initial delay doubling up to 5 seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: usize,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Cap on any single delay
    pub max_delay: Duration,
    /// Growth factor between delays
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Builder starting from the defaults.
    #[must_use]
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder(Self::default())
    }

    /// Delay before retry number `retry` (0-based): `initial * multiplier^retry`,
    /// capped at `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, retry: usize) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);

        if secs.is_finite() && secs < self.max_delay.as_secs_f64() {
            Duration::from_secs_f64(secs)
        } else {
            self.max_delay
        }
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder(RetryPolicy);

impl RetryPolicyBuilder {
    /// Retries after the first attempt
    #[must_use]
    pub const fn max_retries(mut self, max_retries: usize) -> Self {
        self.0.max_retries = max_retries;
        self
    }

    /// Delay before the first retry
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.0.initial_delay = delay;
        self
    }

    /// Cap on any single delay
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.0.max_delay = delay;
        self
    }

    /// Growth factor between delays
    #[must_use]
    pub const fn multiplier(mut self, multiplier: f64) -> Self {
        self.0.multiplier = multiplier;
        self
    }

    /// Finish.
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        self.0
    }
}

/// Run `operation`, retrying the errors `is_retryable` accepts.
///
/// `operation_name` labels log lines and the `retry_*_total` counters.
///
/// # Errors
///
/// The first error `is_retryable` refuses, or the last error once
/// `max_retries` retries are spent.
pub async fn retry_with_predicate<F, Fut, T, E, P>(
    policy: RetryPolicy,
    operation_name: &'static str,
    mut operation: F,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut retry = 0;

    loop {
        let err = match operation().await {
            Ok(value) => {
                if retry > 0 {
                    RetryMetrics::record_success(operation_name);
                    tracing::info!(operation = operation_name, retry, "Succeeded after retrying");
                }
                return Ok(value);
            },
            Err(err) => err,
        };

        if !is_retryable(&err) {
            tracing::warn!(operation = operation_name, error = %err, "Permanent failure, not retrying");
            return Err(err);
        }
        if retry >= policy.max_retries {
            RetryMetrics::record_exhausted(operation_name);
            tracing::error!(operation = operation_name, retry, error = %err, "Retries exhausted");
            return Err(err);
        }

        let delay = policy.delay_for_attempt(retry);
        RetryMetrics::record_attempt(operation_name);
        tracing::warn!(
            operation = operation_name,
            retry,
            delay_ms = delay.as_millis(),
            error = %err,
            "Transient failure, retrying"
        );
        tokio::time::sleep(delay).await;
        retry += 1;
    }
}
