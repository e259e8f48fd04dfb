//! The queue board: state, commands and the reducer that applies them.

pub mod actions;
pub mod environment;
pub mod reducer;
pub mod state;

pub use actions::{QueueAction, Rejection};
pub use environment::QueueEnvironment;
pub use reducer::QueueReducer;
pub use state::{QueueState, QueueSummary};

/// Store running the queue reducer
pub type QueueStore = callboard_runtime::Store<QueueState, QueueAction, QueueEnvironment, QueueReducer>;
