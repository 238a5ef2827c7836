//! Change detection between consecutive scans.
//!
//! [`classify`] is a pure comparison of the previous snapshot against the
//! current scan. [`ChangeDetector`] owns the persisted state and commits
//! each new snapshot as a whole before any file is written back.
//!
//! Modified paths stay pending until their enrichment settles. A pending
//! path is classified as modified again on the next scan, so a failed
//! lookup, a failed write, a shutdown or a crash never drops it.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use super::{CooldownPolicy, PersistedState, ScanSnapshot, StateStore};
use crate::error::Result;
use crate::model::{FileRecord, Signature};

/// How a path changed since the last snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Unchanged,
    New,
    Modified,
    Deleted,
}

/// A present file with its classification.
#[derive(Debug, Clone)]
pub struct Classified {
    pub record: FileRecord,
    pub change: ChangeKind,
}

/// Classification of one scan against the previous snapshot.
#[derive(Debug, Default)]
pub struct ChangeSet {
    /// Files present now, in scan order
    pub files: Vec<Classified>,
    /// Paths present in the previous snapshot but gone now
    pub deleted: Vec<PathBuf>,
}

impl ChangeSet {
    pub fn count(&self, kind: ChangeKind) -> usize {
        if kind == ChangeKind::Deleted {
            return self.deleted.len();
        }
        self.files.iter().filter(|c| c.change == kind).count()
    }
}

/// Compare two signatures of the same path.
///
/// Size or mtime differing means modified. When both agree, a content
/// hash on both sides has the final word.
pub fn compare(previous: &Signature, current: &Signature) -> ChangeKind {
    if !previous.same_stat(current) {
        return ChangeKind::Modified;
    }
    match (&previous.content_hash, &current.content_hash) {
        (Some(old), Some(new)) if old != new => ChangeKind::Modified,
        _ => ChangeKind::Unchanged,
    }
}

/// Classify every path of `current` against `previous`.
pub fn classify(previous: &ScanSnapshot, current: Vec<FileRecord>) -> ChangeSet {
    let mut seen = std::collections::HashSet::with_capacity(current.len());
    let files = current
        .into_iter()
        .map(|record| {
            seen.insert(record.path.clone());
            let change = match previous.get(&record.path) {
                None => ChangeKind::New,
                Some(old) => compare(&old.signature, &record.signature),
            };
            Classified { record, change }
        })
        .collect();

    let deleted = previous
        .records()
        .filter(|r| !seen.contains(&r.path))
        .map(|r| r.path.clone())
        .collect();

    ChangeSet { files, deleted }
}

/// Owner of the persisted snapshot and cooldown history.
pub struct ChangeDetector {
    store: StateStore,
    state: PersistedState,
}

impl ChangeDetector {
    /// Open the store, starting fresh if it cannot be read.
    pub fn open(store: StateStore) -> Self {
        let state = store.load_or_default();
        tracing::info!(
            path = %store.path().display(),
            files = state.snapshot.len(),
            cooldowns = state.cooldowns.len(),
            "Loaded state"
        );
        Self { store, state }
    }

    pub fn snapshot(&self) -> &ScanSnapshot {
        &self.state.snapshot
    }

    pub fn state(&self) -> &PersistedState {
        &self.state
    }

    /// Classify a scan, replace the snapshot with it, and persist.
    ///
    /// Pending paths count as modified even when their signature matches.
    /// Modified paths become pending and lose their cooldown history.
    /// Deleted paths lose both.
    pub fn detect(&mut self, current: Vec<FileRecord>) -> Result<ChangeSet> {
        let mut changes = classify(&self.state.snapshot, current);

        for classified in &mut changes.files {
            if classified.change == ChangeKind::Unchanged
                && self.state.pending.contains(&classified.record.path)
            {
                tracing::debug!(path = %classified.record.path.display(), "Still pending");
                classified.change = ChangeKind::Modified;
            }
        }

        let snapshot = ScanSnapshot::from(
            changes
                .files
                .iter()
                .map(|c| c.record.clone())
                .collect::<Vec<_>>(),
        );

        for classified in &changes.files {
            if classified.change == ChangeKind::Modified {
                self.state.cooldowns.clear(&classified.record.path);
                self.state.pending.insert(classified.record.path.clone());
            }
        }
        self.state.cooldowns.retain(|path| snapshot.contains(path));
        self.state.pending.retain(|path| snapshot.contains(path));
        self.state.snapshot = snapshot;

        self.store.save(&self.state)?;
        Ok(changes)
    }

    /// Fold a re-read record into the snapshot after a successful write.
    pub fn refresh(&mut self, record: FileRecord) {
        self.state.cooldowns.clear(&record.path);
        self.state.snapshot.upsert(record);
    }

    /// Mark a path's enrichment as finished, whatever it found.
    pub fn settle(&mut self, path: &Path) {
        self.state.pending.remove(path);
    }

    /// Record a lookup that ended without a usable match.
    pub fn record_miss(&mut self, path: &Path, now: DateTime<Utc>, policy: &CooldownPolicy) -> bool {
        self.state.cooldowns.record_miss(path, now, policy)
    }

    /// Record a lookup that matched but needed no write.
    pub fn record_match(&mut self, path: &Path) {
        self.state.cooldowns.clear(path);
    }

    pub fn is_suppressed(&self, path: &Path, now: DateTime<Utc>) -> bool {
        self.state.cooldowns.is_suppressed(path, now)
    }

    /// Persist the current in-memory state.
    pub fn persist(&self) -> Result<()> {
        self.store.save(&self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EmbeddedTags;
    use crate::test_utils::mock_record;
    use tempfile::tempdir;

    fn record(path: &str, size: u64, mtime: i128) -> FileRecord {
        mock_record(path, size, mtime, EmbeddedTags::default())
    }

    fn snapshot(records: Vec<FileRecord>) -> ScanSnapshot {
        ScanSnapshot::from(records)
    }

    #[test]
    fn test_first_scan_everything_new() {
        let changes = classify(
            &ScanSnapshot::default(),
            vec![record("/m/a.mp3", 1, 1), record("/m/b.mp3", 2, 2)],
        );
        assert_eq!(changes.count(ChangeKind::New), 2);
        assert!(changes.deleted.is_empty());
    }

    #[test]
    fn test_classification_kinds() {
        let previous = snapshot(vec![
            record("/m/same.mp3", 10, 100),
            record("/m/resized.mp3", 10, 100),
            record("/m/touched.mp3", 10, 100),
            record("/m/gone.mp3", 10, 100),
        ]);
        let current = vec![
            record("/m/same.mp3", 10, 100),
            record("/m/resized.mp3", 11, 100),
            record("/m/touched.mp3", 10, 101),
            record("/m/fresh.mp3", 10, 100),
        ];

        let changes = classify(&previous, current);
        let kind_of = |p: &str| {
            changes
                .files
                .iter()
                .find(|c| c.record.path == Path::new(p))
                .map(|c| c.change)
        };

        assert_eq!(kind_of("/m/same.mp3"), Some(ChangeKind::Unchanged));
        assert_eq!(kind_of("/m/resized.mp3"), Some(ChangeKind::Modified));
        assert_eq!(kind_of("/m/touched.mp3"), Some(ChangeKind::Modified));
        assert_eq!(kind_of("/m/fresh.mp3"), Some(ChangeKind::New));
        assert_eq!(changes.deleted, vec![PathBuf::from("/m/gone.mp3")]);
    }

    #[test]
    fn test_content_hash_wins_over_stat() {
        let mut old = record("/m/a.mp3", 10, 100);
        old.signature.content_hash = Some("aaaa".to_string());
        let mut new = old.clone();
        new.signature.content_hash = Some("bbbb".to_string());

        assert_eq!(compare(&old.signature, &new.signature), ChangeKind::Modified);

        // Mode switch: only one side hashed, fall back to stat
        new.signature.content_hash = None;
        assert_eq!(compare(&old.signature, &new.signature), ChangeKind::Unchanged);
    }

    #[test]
    fn test_detect_persists_and_replaces_snapshot() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        let mut detector = ChangeDetector::open(store.clone());

        detector
            .detect(vec![record("/m/a.mp3", 1, 1), record("/m/b.mp3", 1, 1)])
            .unwrap();
        detector.detect(vec![record("/m/a.mp3", 1, 1)]).unwrap();

        let reopened = ChangeDetector::open(store);
        assert_eq!(reopened.snapshot().len(), 1);
        assert!(reopened.snapshot().contains(Path::new("/m/a.mp3")));
    }

    #[test]
    fn test_modification_and_deletion_reset_cooldown() {
        let dir = tempdir().unwrap();
        let mut detector = ChangeDetector::open(StateStore::new(dir.path().join("state.json")));
        let policy = CooldownPolicy {
            threshold: 1,
            window: chrono::Duration::days(1),
        };
        let now = Utc::now();

        detector
            .detect(vec![record("/m/a.mp3", 1, 1), record("/m/b.mp3", 1, 1)])
            .unwrap();
        detector.record_miss(Path::new("/m/a.mp3"), now, &policy);
        detector.record_miss(Path::new("/m/b.mp3"), now, &policy);
        assert!(detector.is_suppressed(Path::new("/m/a.mp3"), now));

        // a.mp3 modified, b.mp3 deleted
        detector.detect(vec![record("/m/a.mp3", 2, 1)]).unwrap();

        assert!(!detector.is_suppressed(Path::new("/m/a.mp3"), now));
        assert!(detector.state().cooldowns.is_empty());
    }

    #[test]
    fn test_unchanged_keeps_cooldown() {
        let dir = tempdir().unwrap();
        let mut detector = ChangeDetector::open(StateStore::new(dir.path().join("state.json")));
        let policy = CooldownPolicy {
            threshold: 1,
            window: chrono::Duration::days(1),
        };
        let now = Utc::now();

        detector.detect(vec![record("/m/a.mp3", 1, 1)]).unwrap();
        detector.record_miss(Path::new("/m/a.mp3"), now, &policy);
        detector.detect(vec![record("/m/a.mp3", 1, 1)]).unwrap();

        assert!(detector.is_suppressed(Path::new("/m/a.mp3"), now));
    }

    #[test]
    fn test_refresh_replaces_record() {
        let dir = tempdir().unwrap();
        let mut detector = ChangeDetector::open(StateStore::new(dir.path().join("state.json")));
        detector.detect(vec![record("/m/a.mp3", 1, 1)]).unwrap();

        detector.refresh(record("/m/a.mp3", 5, 9));
        detector.persist().unwrap();

        let changes = classify(detector.snapshot(), vec![record("/m/a.mp3", 5, 9)]);
        assert_eq!(changes.count(ChangeKind::Unchanged), 1);
    }

    #[test]
    fn test_unsettled_modification_stays_modified() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        let mut detector = ChangeDetector::open(store.clone());

        detector.detect(vec![record("/m/a.mp3", 1, 1)]).unwrap();
        let changes = detector.detect(vec![record("/m/a.mp3", 2, 1)]).unwrap();
        assert_eq!(changes.count(ChangeKind::Modified), 1);

        // Nothing settled the path, and a restart keeps it pending
        let mut detector = ChangeDetector::open(store);
        let changes = detector.detect(vec![record("/m/a.mp3", 2, 1)]).unwrap();
        assert_eq!(changes.count(ChangeKind::Modified), 1);

        detector.settle(Path::new("/m/a.mp3"));
        let changes = detector.detect(vec![record("/m/a.mp3", 2, 1)]).unwrap();
        assert_eq!(changes.count(ChangeKind::Unchanged), 1);
        assert!(detector.state().pending.is_empty());
    }

    #[test]
    fn test_deleted_path_is_no_longer_pending() {
        let dir = tempdir().unwrap();
        let mut detector = ChangeDetector::open(StateStore::new(dir.path().join("state.json")));

        detector.detect(vec![record("/m/a.mp3", 1, 1)]).unwrap();
        detector.detect(vec![record("/m/a.mp3", 2, 1)]).unwrap();
        assert!(detector.state().pending.contains(Path::new("/m/a.mp3")));

        detector.detect(Vec::new()).unwrap();
        assert!(detector.state().pending.is_empty());
    }
}
