//! Enrichment selection: which classified files get a lookup this cycle.
//!
//! - Modified files are always selected, whatever their tags say.
//! - New files are selected when they lack a required field.
//! - Unchanged files are selected when they lack a required field and
//!   their path is not in cooldown.
//! - Deleted files are never selected.

use chrono::{DateTime, Utc};

use crate::model::{FieldSet, FileRecord};
use crate::state::{ChangeKind, ChangeSet, CooldownTracker};

/// Why a file was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    New,
    Modified,
    IncompleteMetadata,
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reason::New => write!(f, "new"),
            Reason::Modified => write!(f, "modified"),
            Reason::IncompleteMetadata => write!(f, "incomplete"),
        }
    }
}

/// A file selected for an enrichment attempt.
#[derive(Debug, Clone)]
pub struct EnrichmentCandidate {
    pub record: FileRecord,
    pub reason: Reason,
    /// Required fields the file is missing
    pub missing: FieldSet,
}

/// Output of one selection pass.
#[derive(Debug, Default)]
pub struct Selection {
    pub candidates: Vec<EnrichmentCandidate>,
    /// Incomplete files skipped because of cooldown
    pub suppressed: usize,
}

/// Select candidates from a change set.
pub fn select(
    changes: &ChangeSet,
    required: FieldSet,
    cooldowns: &CooldownTracker,
    now: DateTime<Utc>,
) -> Selection {
    let mut selection = Selection::default();

    for classified in &changes.files {
        let record = &classified.record;
        let missing = record.tags.missing(required);

        let reason = match classified.change {
            ChangeKind::Modified => Some(Reason::Modified),
            ChangeKind::New if !missing.is_empty() => Some(Reason::New),
            ChangeKind::Unchanged if !missing.is_empty() => Some(Reason::IncompleteMetadata),
            _ => None,
        };
        let Some(reason) = reason else {
            continue;
        };

        if reason != Reason::Modified && cooldowns.is_suppressed(&record.path, now) {
            tracing::debug!(path = %record.path.display(), "In cooldown, not selected");
            selection.suppressed += 1;
            continue;
        }

        tracing::debug!(
            path = %record.path.display(),
            %reason,
            missing = ?missing.names(),
            "Selected for enrichment"
        );
        selection.candidates.push(EnrichmentCandidate {
            record: record.clone(),
            reason,
            missing,
        });
    }

    selection
}
