//! Axum web framework integration for Callboard.
//!
//! This crate provides the glue between Axum and the reducer/store
//! architecture, implementing the "Functional Core, Imperative Shell"
//! pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Imperative Shell (Axum)         │  ← HTTP, JSON, WebSockets
//! │  - Request parsing                      │  ← Rate limiting, auth
//! │  - Response serialization               │  ← Logging, metrics
//! ├─────────────────────────────────────────┤
//! │         Functional Core                 │
//! │  - Pure business logic (reducers)       │  ← Testable at memory speed
//! │  - State transformations                │  ← No I/O, no side effects
//! │  - Effect descriptions (values)         │  ← Composable, inspectable
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Request Flow
//!
//! 1. **HTTP Request** arrives at Axum handler
//! 2. **Extract data** from request (JSON, headers, query)
//! 3. **Build Action** from extracted data, keyed by a fresh request ID
//! 4. **Dispatch** action through `Store::send_and_wait_for`
//! 5. **Map result** action to HTTP response
//!
//! # Example
//!
//! ```ignore
//! use callboard_web::AppError;
//! use axum::{extract::State, Json};
//!
//! async fn call_next(State(state): State<AppState>) -> Result<Json<CallSnapshot>, AppError> {
//!     state
//!         .dispatch(|request_id| QueueAction::CallNext { request_id })
//!         .await?;
//!     Ok(Json(state.snapshot().await))
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::ClientIp;
pub use middleware::{correlation_id_layer, CORRELATION_ID_HEADER};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
