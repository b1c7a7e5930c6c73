//! Vault persistence backends.
//!
//! The store never touches ambient storage: a backend is injected at
//! construction. Backends persist the entry list together with a
//! monotonically increasing revision counter, and reject writes whose
//! expected revision is stale — two windows of the app sharing one vault
//! get a clean [`VaultError::RevisionConflict`] instead of a silent
//! last-writer-wins overwrite.

use std::fs;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::entry::VaultEntry;
use crate::error::VaultError;

/// A loaded vault snapshot: the entries plus the revision they were read at.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedVault {
    pub revision: u64,
    pub entries: Vec<VaultEntry>,
}

/// Where the entry list lives. Implementations must be safe to call from
/// multiple tasks; the revision check is the write-serialization point.
pub trait VaultBackend: Send + Sync {
    /// Read the current snapshot. A missing vault is revision 0, no entries.
    fn load(&self) -> Result<PersistedVault, VaultError>;

    /// Persist `entries`, but only if the stored revision still equals
    /// `expected_revision`. Returns the new revision.
    fn store(&self, entries: &[VaultEntry], expected_revision: u64) -> Result<u64, VaultError>;
}

// ── In-memory backend ─────────────────────────────────────────────────────────

/// Ephemeral backend for tests and throwaway profiles.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<PersistedVault>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VaultBackend for MemoryBackend {
    fn load(&self) -> Result<PersistedVault, VaultError> {
        let state = self
            .state
            .lock()
            .map_err(|_| VaultError::Backend("memory backend poisoned".into()))?;
        Ok(state.clone())
    }

    fn store(&self, entries: &[VaultEntry], expected_revision: u64) -> Result<u64, VaultError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| VaultError::Backend("memory backend poisoned".into()))?;
        if state.revision != expected_revision {
            return Err(VaultError::RevisionConflict {
                expected: expected_revision,
                actual: state.revision,
            });
        }
        state.revision += 1;
        state.entries = entries.to_vec();
        Ok(state.revision)
    }
}

// ── File backend ──────────────────────────────────────────────────────────────

/// JSON file backend. The on-disk shape is `{revision, entries}`; note the
/// backup/export format is a bare entry array, this wrapper is local state
/// only. Writes go through a temp file + atomic rename in the same
/// directory, so a crash never leaves a half-written vault.
pub struct FileBackend {
    path: PathBuf,
    // Serializes writers within this process; cross-process writers are
    // caught by the revision check against the re-read file.
    write_lock: Mutex<()>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn read_disk(&self) -> Result<PersistedVault, VaultError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PersistedVault::default()),
            Err(e) => Err(e.into()),
        }
    }
}

impl VaultBackend for FileBackend {
    fn load(&self) -> Result<PersistedVault, VaultError> {
        self.read_disk()
    }

    fn store(&self, entries: &[VaultEntry], expected_revision: u64) -> Result<u64, VaultError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| VaultError::Backend("file backend poisoned".into()))?;

        let current = self.read_disk()?;
        if current.revision != expected_revision {
            return Err(VaultError::RevisionConflict {
                expected: expected_revision,
                actual: current.revision,
            });
        }

        let next = PersistedVault {
            revision: expected_revision + 1,
            entries: entries.to_vec(),
        };
        let dir = self
            .path
            .parent()
            .ok_or_else(|| VaultError::Backend("vault path has no parent directory".into()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&serde_json::to_vec(&next)?)?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .map_err(|e| VaultError::Backend(format!("atomic rename failed: {e}")))?;
        Ok(next.revision)
    }
}
