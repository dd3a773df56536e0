//! Snapshot file persistence.
//!
//! The snapshot is a single JSON document holding the whole
//! [`GenerationState`]. It is read once at startup and rewritten wholesale
//! on every persistence tick. Writes go to a sibling temporary file that
//! is then renamed over the target, so a crash mid-write leaves the
//! previous snapshot intact.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use jackpot_types::GenerationState;
use tracing::warn;

use crate::store::StoreError;

/// Read and validate the snapshot at `path`.
///
/// Returns `Ok(None)` if no snapshot exists yet.
///
/// # Errors
///
/// Returns [`StoreError::Io`] if the file exists but cannot be read,
/// [`StoreError::Corrupt`] if it is not a valid snapshot, or
/// [`StoreError::Inconsistent`] if `current` disagrees with the history.
pub async fn load(path: &Path) -> Result<Option<GenerationState>, StoreError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let state: GenerationState =
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;

    if !state.is_consistent() {
        return Err(StoreError::Inconsistent {
            path: path.to_path_buf(),
            reason: format!(
                "current {:?} does not match the last of {} history records",
                state.current,
                state.history.len()
            ),
        });
    }
    if !state.is_chronological() {
        warn!(
            path = %path.display(),
            "Snapshot history has decreasing timestamps; keeping insertion order"
        );
    }

    Ok(Some(state))
}

/// Write `state` to `path`, replacing any previous snapshot.
///
/// # Errors
///
/// Returns [`StoreError::Encode`] if serialization fails or
/// [`StoreError::Io`] if the file cannot be written or renamed.
pub async fn write(path: &Path, state: &GenerationState) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec(state).map_err(|source| StoreError::Encode { source })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    let tmp = temp_path(path);
    tokio::fs::write(&tmp, &bytes)
        .await
        .map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(())
}

/// Sibling path used for the write-then-rename step.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(ToOwned::to_owned).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
