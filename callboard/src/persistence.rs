//! Snapshot persistence for the queue state.
//!
//! The whole [`QueueState`] is written after every applied command. Writes
//! carry the state's revision so a slow write can never overwrite a newer
//! one.

use crate::queue::QueueState;
use callboard_runtime::retry::{retry_with_predicate, RetryPolicy};
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

/// Errors from reading or writing snapshots.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// File system error
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The state could not be encoded
    #[error("failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),

    /// The state file exists but is not a valid snapshot
    #[error("state file {path} is corrupt: {source}")]
    Corrupt {
        /// File involved
        path: PathBuf,
        /// Parse error
        #[source]
        source: serde_json::Error,
    },
}

impl PersistenceError {
    /// Whether retrying the operation could help
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

/// Where queue snapshots live.
///
/// Returns boxed futures so the store can sit behind `Arc<dyn SnapshotStore>`
/// in the environment.
pub trait SnapshotStore: Send + Sync {
    /// Load the last saved snapshot, `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if the snapshot cannot be read or parsed.
    fn load(&self) -> BoxFuture<'_, Result<Option<QueueState>, PersistenceError>>;

    /// Save a snapshot. Snapshots older than the last saved one are skipped.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if the snapshot cannot be written.
    fn save(&self, state: QueueState) -> BoxFuture<'_, Result<(), PersistenceError>>;
}

// ============================================================================
// JSON file
// ============================================================================

/// Snapshot store writing pretty JSON to a single file.
///
/// Writes go to a sibling temporary file that is then renamed over the
/// target, so a crash mid-write leaves the previous snapshot intact.
#[derive(Debug)]
pub struct JsonFileSnapshotStore {
    path: PathBuf,
    retry: RetryPolicy,
    last_written: tokio::sync::Mutex<u64>,
}

impl JsonFileSnapshotStore {
    /// Store snapshots at `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            retry: RetryPolicy::builder()
                .max_retries(3)
                .initial_delay(Duration::from_millis(50))
                .max_delay(Duration::from_secs(2))
                .build(),
            last_written: tokio::sync::Mutex::new(0),
        }
    }

    /// Replace the retry policy for writes
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Path of the state file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn write_atomically(&self, bytes: &[u8]) -> Result<(), PersistenceError> {
        let io_error = |path: &Path| {
            let path = path.to_path_buf();
            move |source| PersistenceError::Io { path, source }
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(io_error(parent))?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, bytes).await.map_err(io_error(&temp))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(io_error(&self.path))
    }
}

impl SnapshotStore for JsonFileSnapshotStore {
    fn load(&self) -> BoxFuture<'_, Result<Option<QueueState>, PersistenceError>> {
        Box::pin(async move {
            let bytes = match tokio::fs::read(&self.path).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::info!(path = %self.path.display(), "No state file yet");
                    return Ok(None);
                },
                Err(source) => {
                    return Err(PersistenceError::Io {
                        path: self.path.clone(),
                        source,
                    })
                },
            };

            let state: QueueState =
                serde_json::from_slice(&bytes).map_err(|source| PersistenceError::Corrupt {
                    path: self.path.clone(),
                    source,
                })?;

            *self.last_written.lock().await = state.revision;
            tracing::info!(
                path = %self.path.display(),
                revision = state.revision,
                "Loaded queue snapshot"
            );
            Ok(Some(state))
        })
    }

    fn save(&self, state: QueueState) -> BoxFuture<'_, Result<(), PersistenceError>> {
        Box::pin(async move {
            // Held across the write: snapshots reach the disk one at a time
            let mut last_written = self.last_written.lock().await;
            if state.revision < *last_written {
                tracing::debug!(
                    revision = state.revision,
                    last_written = *last_written,
                    "Skipping stale snapshot"
                );
                return Ok(());
            }

            let bytes = serde_json::to_vec_pretty(&state).map_err(PersistenceError::Encode)?;

            retry_with_predicate(
                self.retry.clone(),
                "snapshot_save",
                || self.write_atomically(&bytes),
                PersistenceError::is_transient,
            )
            .await?;

            *last_written = state.revision;
            tracing::debug!(revision = state.revision, bytes = bytes.len(), "Snapshot saved");
            Ok(())
        })
    }
}

// ============================================================================
// In memory
// ============================================================================

/// Snapshot store keeping the last snapshot in memory.
///
/// Used when no state file is configured, and in tests.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    inner: Mutex<InMemoryInner>,
}

#[derive(Debug, Default)]
struct InMemoryInner {
    last: Option<QueueState>,
    saves: usize,
}

impl InMemorySnapshotStore {
    /// An empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `state`
    #[must_use]
    pub fn with_state(state: QueueState) -> Self {
        Self {
            inner: Mutex::new(InMemoryInner {
                last: Some(state),
                saves: 0,
            }),
        }
    }

    /// The last saved snapshot
    #[must_use]
    pub fn last(&self) -> Option<QueueState> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last
            .clone()
    }

    /// How many snapshots were accepted
    #[must_use]
    pub fn saves(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).saves
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn load(&self) -> BoxFuture<'_, Result<Option<QueueState>, PersistenceError>> {
        let last = self.last();
        Box::pin(async move { Ok(last) })
    }

    fn save(&self, state: QueueState) -> BoxFuture<'_, Result<(), PersistenceError>> {
        {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            let stale = inner
                .last
                .as_ref()
                .is_some_and(|last| state.revision < last.revision);
            if !stale {
                inner.last = Some(state);
                inner.saves += 1;
            }
        }
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::types::{TicketNumber, TicketRange};

    fn state(revision: u64, called: u32) -> QueueState {
        QueueState {
            range: Some(TicketRange::new(1, 20).unwrap()),
            called,
            revision,
            ..QueueState::default()
        }
    }

    #[tokio::test]
    async fn test_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSnapshotStore::new(dir.path().join("state.json"));

        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let store = JsonFileSnapshotStore::new(&path);

        let mut saved = state(3, 4);
        saved.checked_in.insert(TicketNumber::new(2));
        store.save(saved.clone()).await.unwrap();

        // Temp file renamed away
        assert!(!dir.path().join("nested").join("state.json.tmp").exists());

        let reopened = JsonFileSnapshotStore::new(&path);
        let loaded = reopened.load().await.unwrap().unwrap();
        assert_eq!(loaded, saved);
    }

    #[tokio::test]
    async fn test_stale_revision_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSnapshotStore::new(dir.path().join("state.json"));

        store.save(state(5, 5)).await.unwrap();
        store.save(state(4, 1)).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.revision, 5);
        assert_eq!(loaded.called, 5);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        let store = JsonFileSnapshotStore::new(&path);
        let err = store.load().await.unwrap_err();

        assert!(matches!(err, PersistenceError::Corrupt { .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_unwritable_path_fails_after_retries() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the rename fail
        let path = dir.path().join("state.json");
        tokio::fs::create_dir_all(path.join("occupied")).await.unwrap();

        let store = JsonFileSnapshotStore::new(&path).with_retry_policy(
            RetryPolicy::builder()
                .max_retries(1)
                .initial_delay(Duration::from_millis(1))
                .build(),
        );
        let err = store.save(state(1, 0)).await.unwrap_err();

        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemorySnapshotStore::new();
        assert!(store.load().await.unwrap().is_none());

        store.save(state(2, 2)).await.unwrap();
        store.save(state(1, 1)).await.unwrap();

        assert_eq!(store.saves(), 1);
        assert_eq!(store.load().await.unwrap().unwrap().called, 2);
    }
}
