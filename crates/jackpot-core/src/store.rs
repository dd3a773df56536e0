//! The generation store: sole owner of [`GenerationState`].
//!
//! [`GenerationStore`] is a cheap, cloneable handle. Every clone sees the
//! same state. Reads take a short read lock and return copies, so callers
//! never observe a half-applied tick and never hold the lock while they
//! work. Mutation is reserved for the tick task; the store does not
//! arbitrate between concurrent writers.
//!
//! # Durability
//!
//! A store opened with [`GenerationStore::open`] is bound to a snapshot
//! file. [`persist`](GenerationStore::persist) copies the state under the
//! read lock and writes it without holding the lock. Ticks between two
//! persists are lost on a crash.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use jackpot_types::{GenerationRecord, GenerationState};
use tracing::{debug, info};

use crate::snapshot;

/// Errors raised while loading or persisting the store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The snapshot file could not be read or written.
    #[error("snapshot I/O failed for {}: {source}", path.display())]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The snapshot file exists but is not a valid snapshot.
    #[error("snapshot {} is corrupt: {source}", path.display())]
    Corrupt {
        /// The snapshot file.
        path: PathBuf,
        /// The underlying parse error.
        source: serde_json::Error,
    },

    /// The snapshot parsed but violates the store's invariants.
    #[error("snapshot {} is inconsistent: {reason}", path.display())]
    Inconsistent {
        /// The snapshot file.
        path: PathBuf,
        /// What is wrong with it.
        reason: String,
    },

    /// The state could not be serialized.
    #[error("failed to encode snapshot: {source}")]
    Encode {
        /// The underlying serialization error.
        source: serde_json::Error,
    },
}

struct StoreInner {
    state: RwLock<GenerationState>,
    snapshot_path: Option<PathBuf>,
}

/// Shared handle to the authoritative generation state.
#[derive(Clone)]
pub struct GenerationStore {
    inner: Arc<StoreInner>,
}

impl core::fmt::Debug for GenerationStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GenerationStore")
            .field("snapshot_path", &self.inner.snapshot_path)
            .field("generations", &self.len())
            .finish_non_exhaustive()
    }
}

impl GenerationStore {
    /// Open the store backed by the snapshot at `path`.
    ///
    /// An existing snapshot becomes the initial state. Otherwise the store
    /// starts empty and the empty state is written immediately, so a
    /// snapshot always exists after the first start.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if an existing snapshot cannot be read or
    /// parsed, or if the initial snapshot cannot be written. All of these
    /// are fatal at startup.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = if let Some(state) = snapshot::load(&path).await? {
            info!(
                path = %path.display(),
                generations = state.history.len(),
                completed = state.completed,
                "Snapshot loaded"
            );
            state
        } else {
            let state = GenerationState::default();
            snapshot::write(&path, &state).await?;
            info!(path = %path.display(), "No snapshot found, initial snapshot written");
            state
        };

        Ok(Self::build(state, Some(path)))
    }

    /// Create a store with no snapshot file. [`persist`](Self::persist)
    /// is a no-op.
    pub fn in_memory() -> Self {
        Self::build(GenerationState::default(), None)
    }

    /// Create an unpersisted store seeded with `state`.
    pub fn from_state(state: GenerationState) -> Self {
        Self::build(state, None)
    }

    fn build(state: GenerationState, snapshot_path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(state),
                snapshot_path,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, GenerationState> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, GenerationState> {
        self.inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// The snapshot file this store persists to, if any.
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.inner.snapshot_path.as_deref()
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The most recent record, or [`GenerationRecord::SENTINEL`] before the
    /// first tick.
    pub fn current(&self) -> GenerationRecord {
        self.read().current
    }

    /// A copy of the history, oldest first.
    ///
    /// `Some(n)` returns only the `n` most recent records.
    pub fn history(&self, limit: Option<usize>) -> Vec<GenerationRecord> {
        self.read().recent(limit).to_vec()
    }

    /// Whether the target value has ever been produced.
    pub fn is_completed(&self) -> bool {
        self.read().completed
    }

    /// Number of records in the history.
    pub fn len(&self) -> usize {
        self.read().history.len()
    }

    /// Whether no record has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.read().history.is_empty()
    }

    /// A full copy of the state.
    pub fn snapshot(&self) -> GenerationState {
        self.read().clone()
    }

    // -----------------------------------------------------------------------
    // Mutation (tick task only)
    // -----------------------------------------------------------------------

    /// Raise the completion flag. Returns `true` if it was previously unset.
    ///
    /// Calling this when already completed changes nothing.
    pub fn set_completed(&self) -> bool {
        let mut state = self.write();
        let newly = !state.completed;
        state.completed = true;
        newly
    }

    /// Append `record` and make it the current record.
    pub fn append(&self, record: GenerationRecord) {
        let mut state = self.write();
        state.current = record;
        state.history.push(record);
    }

    /// Apply one tick's result as a single step.
    ///
    /// If `target_hit`, the flag is raised before the record is appended,
    /// both under the same lock, so no reader sees one without the other.
    /// Returns `true` if this call raised the flag.
    pub fn commit(&self, record: GenerationRecord, target_hit: bool) -> bool {
        let mut state = self.write();
        let newly = target_hit && !state.completed;
        if target_hit {
            state.completed = true;
        }
        state.current = record;
        state.history.push(record);
        newly
    }

    // -----------------------------------------------------------------------
    // Durability
    // -----------------------------------------------------------------------

    /// Write the current state to the snapshot file.
    ///
    /// The written snapshot reflects some prefix of the history as of the
    /// call. Does nothing for an in-memory store.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the snapshot cannot be encoded or
    /// written. In-memory state is unaffected either way.
    pub async fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = self.inner.snapshot_path.as_deref() else {
            return Ok(());
        };
        let state = self.snapshot();
        snapshot::write(path, &state).await?;
        debug!(
            path = %path.display(),
            generations = state.history.len(),
            "Snapshot written"
        );
        Ok(())
    }
}
