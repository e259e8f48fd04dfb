//! HTTP request handlers shared by Callboard services.

pub mod health;
pub mod websocket;

// Re-export common handler utilities
pub use health::{health_check, health_check_with_store};
pub use websocket::{stream_actions, StreamOptions};
