//! Persistent state: the last scan snapshot plus cooldown history.
//!
//! Stored as a single JSON file. Every save writes a sibling temp file and
//! renames it over the old one, so a reader (or a restart after a crash)
//! only ever sees a complete snapshot.

pub mod cooldown;
pub mod detector;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::model::FileRecord;

pub use cooldown::{CooldownPolicy, CooldownTracker};
pub use detector::{ChangeDetector, ChangeKind, ChangeSet, Classified};

/// Bumped when the on-disk layout changes incompatibly.
const STATE_VERSION: u32 = 1;

/// Mapping from path to the record seen by the last completed scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<FileRecord>", into = "Vec<FileRecord>")]
pub struct ScanSnapshot {
    files: BTreeMap<PathBuf, FileRecord>,
}

impl From<Vec<FileRecord>> for ScanSnapshot {
    fn from(records: Vec<FileRecord>) -> Self {
        Self {
            files: records.into_iter().map(|r| (r.path.clone(), r)).collect(),
        }
    }
}

impl From<ScanSnapshot> for Vec<FileRecord> {
    fn from(snapshot: ScanSnapshot) -> Self {
        snapshot.files.into_values().collect()
    }
}

impl ScanSnapshot {
    pub fn get(&self, path: &Path) -> Option<&FileRecord> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    /// Insert or replace the record for its path.
    pub fn upsert(&mut self, record: FileRecord) {
        self.files.insert(record.path.clone(), record);
    }

    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.values()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Everything persisted between cycles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: u32,
    #[serde(default)]
    pub snapshot: ScanSnapshot,
    #[serde(default)]
    pub cooldowns: CooldownTracker,
    /// Modified paths whose enrichment has not finished yet
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub pending: BTreeSet<PathBuf>,
}

/// File-backed store for [`PersistedState`].
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored state. A missing file is an empty state.
    pub fn load(&self) -> Result<PersistedState> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PersistedState {
                    version: STATE_VERSION,
                    ..Default::default()
                });
            }
            Err(e) => return Err(Error::state(&self.path, e.to_string())),
        };

        let state: PersistedState =
            serde_json::from_str(&contents).map_err(|e| Error::state(&self.path, e.to_string()))?;
        if state.version != STATE_VERSION {
            return Err(Error::state(
                &self.path,
                format!("unsupported state version {}", state.version),
            ));
        }
        Ok(state)
    }

    /// Read the stored state, starting fresh if it is unreadable.
    ///
    /// A fresh start only costs lookups for incomplete files; it never
    /// skips a file that needs work.
    pub fn load_or_default(&self) -> PersistedState {
        match self.load() {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!("Ignoring unreadable state, starting fresh: {}", e);
                PersistedState {
                    version: STATE_VERSION,
                    ..Default::default()
                }
            }
        }
    }

    /// Atomically replace the stored state.
    pub fn save(&self, state: &PersistedState) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| Error::state(dir, e.to_string()))?;
        }

        let contents =
            serde_json::to_vec(state).map_err(|e| Error::state(&self.path, e.to_string()))?;

        let temp_path = self.path.with_extension("json.tmp");
        let write_temp = || -> std::io::Result<()> {
            let mut file = std::fs::File::create(&temp_path)?;
            file.write_all(&contents)?;
            file.sync_all()
        };
        write_temp().map_err(|e| Error::state(&temp_path, e.to_string()))?;

        std::fs::rename(&temp_path, &self.path)
            .map_err(|e| Error::state(&self.path, e.to_string()))?;

        tracing::debug!(path = %self.path.display(), files = state.snapshot.len(), "Saved state");
        Ok(())
    }
}
