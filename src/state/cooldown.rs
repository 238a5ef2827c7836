//! Cooldown tracking for files that keep coming back without a match.
//!
//! Each path counts consecutive "not found" lookups. Once the count reaches
//! the threshold the path is suppressed until the window has elapsed. A
//! lookup after the window that misses again re-suppresses immediately,
//! since the count is only reset by a match or a file modification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// When a path gets suppressed and for how long.
#[derive(Debug, Clone, Copy)]
pub struct CooldownPolicy {
    pub threshold: u32,
    pub window: chrono::Duration,
}

impl From<&crate::config::CooldownConfig> for CooldownPolicy {
    fn from(config: &crate::config::CooldownConfig) -> Self {
        Self {
            threshold: config.threshold,
            window: config.window(),
        }
    }
}

/// Miss history for one path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownEntry {
    pub consecutive_misses: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suppressed_until: Option<DateTime<Utc>>,
}

/// On-disk shape of one entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CooldownRecord {
    path: PathBuf,
    #[serde(flatten)]
    entry: CooldownEntry,
}

/// Per-path miss counters, persisted alongside the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<CooldownRecord>", into = "Vec<CooldownRecord>")]
pub struct CooldownTracker {
    entries: BTreeMap<PathBuf, CooldownEntry>,
}

impl From<Vec<CooldownRecord>> for CooldownTracker {
    fn from(records: Vec<CooldownRecord>) -> Self {
        Self {
            entries: records.into_iter().map(|r| (r.path, r.entry)).collect(),
        }
    }
}

impl From<CooldownTracker> for Vec<CooldownRecord> {
    fn from(tracker: CooldownTracker) -> Self {
        tracker
            .entries
            .into_iter()
            .map(|(path, entry)| CooldownRecord { path, entry })
            .collect()
    }
}

impl CooldownTracker {
    pub fn get(&self, path: &Path) -> Option<&CooldownEntry> {
        self.entries.get(path)
    }

    /// Whether lookups for `path` are currently suppressed.
    pub fn is_suppressed(&self, path: &Path, now: DateTime<Utc>) -> bool {
        self.entries
            .get(path)
            .and_then(|e| e.suppressed_until)
            .is_some_and(|until| now < until)
    }

    /// Record a "not found" result. Returns true if this miss suppressed
    /// the path.
    pub fn record_miss(&mut self, path: &Path, now: DateTime<Utc>, policy: &CooldownPolicy) -> bool {
        let entry = self.entries.entry(path.to_path_buf()).or_default();
        entry.consecutive_misses = entry.consecutive_misses.saturating_add(1);
        if entry.consecutive_misses >= policy.threshold {
            entry.suppressed_until = Some(
                now.checked_add_signed(policy.window)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            );
            true
        } else {
            false
        }
    }

    /// Forget the history of a path (matched, modified, or deleted).
    pub fn clear(&mut self, path: &Path) {
        self.entries.remove(path);
    }

    /// Drop entries for paths not accepted by `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&Path) -> bool) {
        self.entries.retain(|path, _| keep(path));
    }

    /// Paths suppressed at `now`, with their expiry.
    pub fn suppressed(&self, now: DateTime<Utc>) -> Vec<(&Path, DateTime<Utc>)> {
        self.entries
            .iter()
            .filter_map(|(path, e)| {
                e.suppressed_until
                    .filter(|until| now < *until)
                    .map(|until| (path.as_path(), until))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
