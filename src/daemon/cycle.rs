//! One scan-diff-enrich-write cycle.
//!
//! 1. Scan the music folder (blocking pool).
//! 2. Classify against the snapshot and commit the new snapshot.
//! 3. Select candidates.
//! 4. Look up and write back, a few files at a time.
//! 5. Fold the outcomes into the state and persist it.
//!
//! Only a failure of step 1 or of a state save ends the cycle early. Every
//! per-file failure is logged and counted, and the file stays a candidate.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use tokio::sync::watch;

use super::DaemonState;
use crate::config::{Config, SignatureMode};
use crate::enrichment::{LookupOutcome, MetadataClient, hints};
use crate::error::{Error, Result, ResultExt};
use crate::metadata;
use crate::model::{FieldSet, FileRecord};
use crate::scanner::{self, ScanOptions};
use crate::selector::{self, EnrichmentCandidate};
use crate::state::{ChangeDetector, ChangeKind, CooldownPolicy, StateStore};

/// Counters for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub scanned: usize,
    pub unreadable: usize,
    pub new: usize,
    pub modified: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub candidates: usize,
    pub suppressed: usize,
    pub enriched: usize,
    pub not_found: usize,
    pub lookup_failed: usize,
    pub write_failed: usize,
    pub no_hints: usize,
    pub skipped_on_shutdown: usize,
}

impl std::fmt::Display for CycleStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Scanned:             {}", self.scanned)?;
        writeln!(f, "  new:               {}", self.new)?;
        writeln!(f, "  modified:          {}", self.modified)?;
        writeln!(f, "  unchanged:         {}", self.unchanged)?;
        writeln!(f, "  deleted:           {}", self.deleted)?;
        writeln!(f, "  unreadable:        {}", self.unreadable)?;
        writeln!(f, "Candidates:          {}", self.candidates)?;
        writeln!(f, "  in cooldown:       {}", self.suppressed)?;
        writeln!(f, "Enriched:            {}", self.enriched)?;
        writeln!(f, "Not found:           {}", self.not_found)?;
        writeln!(f, "No search hints:     {}", self.no_hints)?;
        writeln!(f, "Lookup failed:       {}", self.lookup_failed)?;
        writeln!(f, "Write failed:        {}", self.write_failed)?;
        write!(f, "Skipped on shutdown: {}", self.skipped_on_shutdown)
    }
}

/// What happened to one candidate.
#[derive(Debug)]
enum FileOutcome {
    /// Tags written; carries the re-read record when it could be indexed
    Written {
        refreshed: Option<FileRecord>,
        filled_required: bool,
    },
    /// Dry run: a write was planned but not performed
    WouldWrite { filled_required: bool },
    /// Matched, and the file already holds everything required
    Satisfied,
    /// No usable match (including a match that fills nothing required)
    NotFound,
    NoHints,
    LookupFailed,
    WriteFailed,
    SkippedOnShutdown,
}

impl FileOutcome {
    /// Whether the lookup reached an answer. Anything else leaves a
    /// modified file pending for the next cycle.
    fn is_settled(&self) -> bool {
        !matches!(
            self,
            FileOutcome::LookupFailed | FileOutcome::WriteFailed | FileOutcome::SkippedOnShutdown
        )
    }
}

/// The enrichment pipeline and the state it carries between cycles.
pub struct Pipeline {
    root: PathBuf,
    scan_options: ScanOptions,
    required: FieldSet,
    overwrite: bool,
    dry_run: bool,
    concurrency: usize,
    cooldown: CooldownPolicy,
    client: MetadataClient,
    detector: ChangeDetector,
}

impl Pipeline {
    pub fn new(config: &Config, client: MetadataClient, store: StateStore) -> Result<Self> {
        Ok(Self {
            root: config.library.music_folder.clone(),
            scan_options: ScanOptions::new(&config.library.extensions, config.library.signature),
            required: config.required_fields()?,
            overwrite: config.enrichment.overwrite_existing,
            dry_run: config.enrichment.dry_run,
            concurrency: config.enrichment.concurrency.max(1),
            cooldown: CooldownPolicy::from(&config.cooldown),
            client,
            detector: ChangeDetector::open(store),
        })
    }

    #[cfg(test)]
    pub fn detector(&self) -> &ChangeDetector {
        &self.detector
    }

    /// Run one full cycle.
    ///
    /// `shutdown` is checked before each file; files not started when it
    /// flips are counted as skipped and picked up next time.
    pub async fn run_cycle(
        &mut self,
        shutdown: &watch::Receiver<bool>,
        state: &watch::Sender<DaemonState>,
    ) -> Result<CycleStats> {
        state.send_replace(DaemonState::Scanning);

        let root = self.root.clone();
        let options = self.scan_options.clone();
        let output = tokio::task::spawn_blocking(move || scanner::scan(&root, &options))
            .await
            .map_err(|e| Error::scan(&self.root, format!("scan task failed: {e}")))??;

        let mut stats = CycleStats {
            scanned: output.records.len(),
            unreadable: output.skipped,
            ..Default::default()
        };

        let changes = self
            .detector
            .detect(output.records)
            .with_context("committing scan snapshot")?;
        stats.new = changes.count(ChangeKind::New);
        stats.modified = changes.count(ChangeKind::Modified);
        stats.unchanged = changes.count(ChangeKind::Unchanged);
        stats.deleted = changes.count(ChangeKind::Deleted);

        let now = Utc::now();
        let selection = selector::select(
            &changes,
            self.required,
            &self.detector.state().cooldowns,
            now,
        );
        stats.candidates = selection.candidates.len();
        stats.suppressed = selection.suppressed;

        if selection.candidates.is_empty() {
            tracing::info!(
                scanned = stats.scanned,
                tracked = self.detector.snapshot().len(),
                suppressed = stats.suppressed,
                "Nothing to enrich"
            );
            return Ok(stats);
        }

        state.send_replace(DaemonState::Enriching);
        tracing::info!(
            candidates = stats.candidates,
            suppressed = stats.suppressed,
            dry_run = self.dry_run,
            "Enriching"
        );

        let outcomes: Vec<(PathBuf, FileOutcome)> = {
            let this = &*self;
            stream::iter(selection.candidates)
                .map(|candidate| async move {
                    let path = candidate.record.path.clone();
                    let outcome = if *shutdown.borrow() {
                        FileOutcome::SkippedOnShutdown
                    } else {
                        this.process(candidate).await
                    };
                    (path, outcome)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await
        };

        let now = Utc::now();
        for (path, outcome) in outcomes {
            self.apply(&path, outcome, now, &mut stats);
        }
        self.detector
            .persist()
            .with_context("saving lookup results")?;

        Ok(stats)
    }

    /// Look up one candidate and write back what it is missing.
    async fn process(&self, candidate: EnrichmentCandidate) -> FileOutcome {
        let record = &candidate.record;
        let hints = hints::build(record, &self.root);

        if hints.title.is_none() {
            tracing::debug!(path = %record.path.display(), "No title hint, not searching");
            return FileOutcome::NoHints;
        }

        let result = match self.client.lookup(&hints).await {
            Ok(LookupOutcome::Found(result)) => result,
            Ok(LookupOutcome::NotFound) => {
                tracing::debug!(path = %record.path.display(), "No match");
                return FileOutcome::NotFound;
            }
            Err(e) => {
                let transient = e.is_transient();
                let err = Error::from(e);
                tracing::warn!(
                    path = %record.path.display(),
                    kind = err.kind(),
                    transient,
                    "{}",
                    err
                );
                return FileOutcome::LookupFailed;
            }
        };

        let planned = metadata::fields_to_write(&record.tags, &result.fields, self.overwrite);
        let planned_fields = planned.present();
        let filled_required =
            candidate.missing.is_empty() || planned_fields.intersects(candidate.missing);

        if planned_fields.is_empty() {
            return if candidate.missing.is_empty() {
                FileOutcome::Satisfied
            } else {
                tracing::debug!(
                    path = %record.path.display(),
                    missing = ?candidate.missing.names(),
                    "Match has none of the missing fields"
                );
                FileOutcome::NotFound
            };
        }

        if self.dry_run {
            tracing::info!(
                path = %record.path.display(),
                fields = ?planned_fields.names(),
                source_id = ?result.source_id,
                "Would write tags"
            );
            return FileOutcome::WouldWrite { filled_required };
        }

        let path = record.path.clone();
        let mode = self.scan_options.signature;
        let written = tokio::task::spawn_blocking(move || write_and_reindex(&path, &planned, mode))
            .await;

        match written {
            Ok(Ok(refreshed)) => {
                tracing::info!(
                    path = %record.path.display(),
                    fields = ?planned_fields.names(),
                    confidence = result.confidence,
                    "Wrote tags"
                );
                FileOutcome::Written {
                    refreshed,
                    filled_required,
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(path = %record.path.display(), kind = e.kind(), "{}", e);
                FileOutcome::WriteFailed
            }
            Err(e) => {
                tracing::warn!(path = %record.path.display(), kind = "write", "Write task failed: {}", e);
                FileOutcome::WriteFailed
            }
        }
    }

    /// Fold one outcome into the state and the counters.
    fn apply(
        &mut self,
        path: &Path,
        outcome: FileOutcome,
        now: chrono::DateTime<Utc>,
        stats: &mut CycleStats,
    ) {
        if outcome.is_settled() {
            self.detector.settle(path);
        }
        match outcome {
            FileOutcome::Written {
                refreshed,
                filled_required,
            } => {
                stats.enriched += 1;
                if let Some(record) = refreshed {
                    self.detector.refresh(record);
                }
                if !filled_required {
                    self.record_miss(path, now);
                }
            }
            FileOutcome::WouldWrite { filled_required } => {
                stats.enriched += 1;
                if !filled_required {
                    self.record_miss(path, now);
                }
            }
            FileOutcome::Satisfied => self.detector.record_match(path),
            FileOutcome::NotFound => {
                stats.not_found += 1;
                self.record_miss(path, now);
            }
            FileOutcome::NoHints => {
                stats.no_hints += 1;
                self.record_miss(path, now);
            }
            FileOutcome::LookupFailed => stats.lookup_failed += 1,
            FileOutcome::WriteFailed => stats.write_failed += 1,
            FileOutcome::SkippedOnShutdown => stats.skipped_on_shutdown += 1,
        }
    }

    fn record_miss(&mut self, path: &Path, now: chrono::DateTime<Utc>) {
        if self.detector.record_miss(path, now, &self.cooldown) {
            tracing::info!(
                path = %path.display(),
                misses = self.cooldown.threshold,
                "No match repeatedly, cooling down"
            );
        }
    }
}

/// Write tags, then re-read the file so the snapshot matches the disk.
///
/// A failed re-read is not a write failure; the file is simply seen as
/// modified next cycle.
fn write_and_reindex(
    path: &Path,
    fields: &crate::model::EmbeddedTags,
    mode: SignatureMode,
) -> Result<Option<FileRecord>> {
    metadata::write(path, fields)?;
    match scanner::index_file(path, mode) {
        Ok(record) => Ok(Some(record)),
        Err(e) => {
            tracing::warn!(path = %path.display(), kind = e.kind(), "Re-read after write failed: {}", e);
            Ok(None)
        }
    }
}
