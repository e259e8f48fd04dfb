//! Callboard: a queue ticketing board.
//!
//! Visitors take a numbered ticket. Staff call numbers forward while the
//! venue has room, scan tickets at the door on the way in and out, and print
//! ticket sheets whose QR codes link each visitor to a page showing how close
//! their number is.
//!
//! # Architecture
//!
//! ```text
//!   HTTP / WebSocket (axum)
//!          │
//!          ▼
//!   ┌─────────────┐   commands    ┌──────────────┐
//!   │  AppState   │ ────────────▶ │  QueueStore  │
//!   │  dispatch   │ ◀──────────── │ QueueReducer │
//!   └─────────────┘   outcomes    └──────┬───────┘
//!                                        │ effects
//!                         ┌──────────────┴─────────────┐
//!                         ▼                            ▼
//!                  snapshot save              CallChanged broadcast
//!                  (JSON file)                 (WebSocket viewers)
//! ```
//!
//! All queue rules live in [`queue::QueueReducer`] and [`call`]; they are pure
//! and tested without a runtime. The store serializes commands, so two scans
//! arriving together cannot both take the last place inside. See [`call`]
//! for how capacity moves the call forward.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod app;
pub mod auth;
pub mod call;
pub mod config;
pub mod metrics;
pub mod persistence;
pub mod queue;
pub mod rate_limit;
pub mod server;
pub mod sheet;
pub mod types;

pub use app::CallboardApp;
pub use config::Config;
pub use queue::{QueueAction, QueueReducer, QueueState, QueueStore};
pub use types::*;
