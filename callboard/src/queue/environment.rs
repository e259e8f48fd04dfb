//! Dependencies injected into the queue reducer.

use crate::persistence::SnapshotStore;
use callboard_core::environment::Clock;
use std::sync::Arc;

/// Environment dependencies for the queue reducer
#[derive(Clone)]
pub struct QueueEnvironment {
    /// Clock for `updated_at`
    pub clock: Arc<dyn Clock>,
    /// Where snapshots are written after every applied command
    pub snapshots: Arc<dyn SnapshotStore>,
}

impl QueueEnvironment {
    /// Creates a new `QueueEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, snapshots: Arc<dyn SnapshotStore>) -> Self {
        Self { clock, snapshots }
    }
}
