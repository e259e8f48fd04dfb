//! Per-IP rate limiting for the user routes.
//!
//! Sliding window: a client may make `max_requests` requests in any
//! `window`. Hits older than the window are dropped when the client is seen
//! again, and [`RateLimiter::sweep`] drops idle clients altogether.

use axum::{
    extract::{Request, State},
    http::{header::RETRY_AFTER, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use callboard_core::environment::Clock;
use callboard_web::{AppError, ClientIp};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Message sent with a 429
pub const RATE_LIMIT_MESSAGE: &str = "Too many requests from this IP, try again after 5 minutes.";

/// Default requests per window
pub const DEFAULT_MAX_REQUESTS: u32 = 100;

/// Default window
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(5 * 60);

/// A client went over its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimited {
    /// When the oldest hit in the window expires
    pub retry_after: Duration,
}

/// Sliding-window limiter keyed by client IP.
#[derive(Clone)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
    hits: Arc<Mutex<HashMap<IpAddr, VecDeque<DateTime<Utc>>>>>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_requests", &self.max_requests)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Create a limiter allowing `max_requests` per `window`
    #[must_use]
    pub fn new(max_requests: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_requests,
            window,
            clock,
            hits: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.window)
            .ok()
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Count a request from `ip`.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimited`] when `ip` already made `max_requests` requests
    /// in the current window. Refused requests are not counted.
    pub fn check(&self, ip: IpAddr) -> Result<(), RateLimited> {
        let now = self.clock.now();
        let window_start = self.window_start(now);

        let mut hits = self.hits.lock().unwrap_or_else(PoisonError::into_inner);
        let timestamps = hits.entry(ip).or_default();

        while timestamps.front().is_some_and(|t| *t <= window_start) {
            timestamps.pop_front();
        }

        if timestamps.len() >= self.max_requests as usize {
            let retry_after = timestamps
                .front()
                .and_then(|oldest| (*oldest - window_start).to_std().ok())
                .unwrap_or(self.window);

            tracing::warn!(
                rate_limit_exceeded = true,
                client_ip = %ip,
                requests = timestamps.len(),
                max_requests = self.max_requests,
                retry_after_secs = retry_after.as_secs(),
                "Rate limit exceeded"
            );
            return Err(RateLimited { retry_after });
        }

        timestamps.push_back(now);
        Ok(())
    }

    /// Forget clients with no hits in the current window
    pub fn sweep(&self) -> usize {
        let window_start = self.window_start(self.clock.now());
        let mut hits = self.hits.lock().unwrap_or_else(PoisonError::into_inner);
        let before = hits.len();
        hits.retain(|_, timestamps| timestamps.back().is_some_and(|t| *t > window_start));
        let removed = before - hits.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = hits.len(), "Swept idle rate limit entries");
        }
        removed
    }

    /// Clients currently tracked
    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.hits.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Middleware applying the limiter to every request it wraps.
pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    ClientIp(ip): ClientIp,
    request: Request,
    next: Next,
) -> Response {
    match limiter.check(ip) {
        Ok(()) => next.run(request).await,
        Err(limited) => {
            crate::metrics::record_rate_limited();
            let mut response = AppError::too_many_requests(RATE_LIMIT_MESSAGE).into_response();
            // Round up so clients never retry early
            let seconds = limited.retry_after.as_secs() + u64::from(limited.retry_after.subsec_nanos() > 0);
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
            response
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use callboard_testing::ManualClock;
    use std::net::Ipv4Addr;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 0, 2, last))
    }

    #[test]
    fn test_allows_up_to_limit_then_refuses() {
        let clock = ManualClock::new(callboard_testing::test_epoch());
        let limiter = RateLimiter::new(3, Duration::from_secs(60), Arc::new(clock));

        for _ in 0..3 {
            assert!(limiter.check(ip(1)).is_ok());
        }
        let limited = limiter.check(ip(1)).unwrap_err();
        assert_eq!(limited.retry_after, Duration::from_secs(60));

        // Other clients have their own budget
        assert!(limiter.check(ip(2)).is_ok());
    }

    #[test]
    fn test_window_slides() {
        let clock = ManualClock::new(callboard_testing::test_epoch());
        let limiter = RateLimiter::new(2, Duration::from_secs(60), Arc::new(clock.clone()));

        limiter.check(ip(1)).unwrap();
        clock.advance(chrono::Duration::seconds(30));
        limiter.check(ip(1)).unwrap();
        assert!(limiter.check(ip(1)).is_err());

        // First hit leaves the window
        clock.advance(chrono::Duration::seconds(31));
        assert!(limiter.check(ip(1)).is_ok());
        let limited = limiter.check(ip(1)).unwrap_err();
        assert_eq!(limited.retry_after, Duration::from_secs(29));
    }

    #[test]
    fn test_sweep_forgets_idle_clients() {
        let clock = ManualClock::new(callboard_testing::test_epoch());
        let limiter = RateLimiter::new(5, Duration::from_secs(60), Arc::new(clock.clone()));

        limiter.check(ip(1)).unwrap();
        clock.advance(chrono::Duration::seconds(45));
        limiter.check(ip(2)).unwrap();
        clock.advance(chrono::Duration::seconds(30));

        assert_eq!(limiter.sweep(), 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }
}
