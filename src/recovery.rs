//! Recovery store for sessions interrupted by host teardown
//!
//! When the owning host is torn down mid-turn, the session id and an
//! interruption flag are written here. The next fresh instance takes them
//! back exactly once and may resume the conversation.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};
use crate::types::identifiers::SessionId;

/// Default file name used by [`FileRecoveryStore::in_dir`]
pub const RECOVERY_FILE_NAME: &str = "claude-session-recovery.json";

/// Recovered interruption record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interruption {
    /// Whether the previous instance was torn down mid-turn
    pub interrupted: bool,
    /// Session id at the time of the interruption
    pub session_id: SessionId,
}

/// Durable key-value storage for the interruption record
pub trait RecoveryStore: Send + Sync {
    /// Record that the session was interrupted
    ///
    /// # Errors
    /// Returns error if the record cannot be written
    fn persist_interruption(&self, session_id: &SessionId) -> Result<()>;

    /// Read and clear the record
    ///
    /// Returns a default (not interrupted, empty id) record when nothing was
    /// stored. A second call after a successful take always returns the default.
    ///
    /// # Errors
    /// Returns error if the record exists but cannot be read or cleared
    fn take_interruption(&self) -> Result<Interruption>;
}

// ============================================================================
// File-backed store
// ============================================================================

/// Recovery store backed by a single JSON file
///
/// Writes go to a temporary sibling and are renamed into place.
#[derive(Debug)]
pub struct FileRecoveryStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileRecoveryStore {
    /// Use the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Use [`RECOVERY_FILE_NAME`] inside `dir`, creating the directory
    ///
    /// # Errors
    /// Returns error if the directory cannot be created
    pub fn in_dir(dir: impl AsRef<Path>) -> Result<Self> {
        fs::create_dir_all(dir.as_ref()).map_err(|err| {
            SessionError::recovery(format!(
                "create recovery dir {} failed: {err}",
                dir.as_ref().display()
            ))
        })?;
        Ok(Self::new(dir.as_ref().join(RECOVERY_FILE_NAME)))
    }

    /// Path of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecoveryStore for FileRecoveryStore {
    fn persist_interruption(&self, session_id: &SessionId) -> Result<()> {
        let _guard = self.lock.lock();
        let record = Interruption {
            interrupted: true,
            session_id: session_id.clone(),
        };
        let raw = serde_json::to_vec_pretty(&record)?;
        let tmp = self.path.with_extension("json.tmp");
        write_synced(&tmp, &raw)
            .map_err(|err| SessionError::recovery(format!("write recovery file failed: {err}")))?;
        fs::rename(&tmp, &self.path)
            .map_err(|err| SessionError::recovery(format!("rename recovery file failed: {err}")))?;
        log::debug!("Persisted interruption for session {session_id}");
        Ok(())
    }

    fn take_interruption(&self) -> Result<Interruption> {
        let _guard = self.lock.lock();
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Interruption::default());
            }
            Err(err) => {
                return Err(SessionError::recovery(format!(
                    "read recovery file failed: {err}"
                )));
            }
        };

        // Clear before decoding so a corrupt record is not retried forever.
        fs::remove_file(&self.path)
            .map_err(|err| SessionError::recovery(format!("clear recovery file failed: {err}")))?;

        Ok(serde_json::from_slice(&raw)?)
    }
}

/// Write `raw` and flush it to disk before returning
fn write_synced(path: &Path, raw: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(raw)?;
    file.sync_all()
}

// ============================================================================
// In-memory store
// ============================================================================

/// Recovery store that lives only as long as the process
#[derive(Debug, Default)]
pub struct MemoryRecoveryStore {
    record: Mutex<Option<SessionId>>,
}

impl MemoryRecoveryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecoveryStore for MemoryRecoveryStore {
    fn persist_interruption(&self, session_id: &SessionId) -> Result<()> {
        *self.record.lock() = Some(session_id.clone());
        Ok(())
    }

    fn take_interruption(&self) -> Result<Interruption> {
        Ok(self
            .record
            .lock()
            .take()
            .map_or_else(Interruption::default, |session_id| Interruption {
                interrupted: true,
                session_id,
            }))
    }
}
