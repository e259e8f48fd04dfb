//! Admin password.
//!
//! The board keeps only a digest of the admin password: base64 of its
//! SHA-256. Admin routes compare a presented password against it in constant
//! time. While no password is set the admin routes are open, which is how a
//! fresh install gets its first password.

use crate::server::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use callboard_web::AppError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Header carrying the admin password.
pub const ADMIN_PASSWORD_HEADER: &str = "X-Admin-Password";

/// Base64 SHA-256 digest of the admin password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PasswordDigest(String);

impl PasswordDigest {
    /// Digest a plain-text password
    #[must_use]
    pub fn of(password: &str) -> Self {
        let hash = Sha256::digest(password.as_bytes());
        Self(STANDARD.encode(hash))
    }

    /// Whether `candidate` hashes to this digest
    #[must_use]
    pub fn verifies(&self, candidate: &str) -> bool {
        let presented = Self::of(candidate);
        constant_time_eq::constant_time_eq(self.0.as_bytes(), presented.0.as_bytes())
    }
}

// Never print the digest
impl fmt::Debug for PasswordDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordDigest(..)")
    }
}

/// Outcome of checking a request against the stored digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// No password has been set yet
    Open,
    /// The presented password matches
    Granted,
    /// No password presented
    Missing,
    /// Wrong password presented
    Denied,
}

/// Check a presented password against the stored digest.
#[must_use]
pub fn check_access(stored: Option<&PasswordDigest>, presented: Option<&str>) -> Access {
    match (stored, presented) {
        (None, _) => Access::Open,
        (Some(_), None) => Access::Missing,
        (Some(digest), Some(password)) if digest.verifies(password) => Access::Granted,
        (Some(_), Some(_)) => Access::Denied,
    }
}

/// Middleware guarding the admin routes.
///
/// Reads `X-Admin-Password` and checks it against the digest in the queue
/// state. Responds 401 when a password is set and the header is missing or
/// wrong.
pub async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let presented = request
        .headers()
        .get(ADMIN_PASSWORD_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let stored = state.store.state(|s| s.admin_password.clone()).await;

    match check_access(stored.as_ref(), presented.as_deref()) {
        Access::Open | Access::Granted => next.run(request).await,
        Access::Missing => {
            tracing::debug!(path = %request.uri().path(), "Admin password missing");
            AppError::unauthorized("Admin password required").into_response()
        },
        Access::Denied => {
            tracing::warn!(path = %request.uri().path(), "Wrong admin password");
            AppError::unauthorized("Wrong admin password").into_response()
        },
    }
}
