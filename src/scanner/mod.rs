//! File index: walks the music folder and builds a [`FileRecord`] for every
//! recognized audio file.
//!
//! The walk is read-only and does not follow symlinks. An unreadable root is
//! a [`Error::Scan`]; any single file that cannot be stat'ed or whose tags
//! cannot be parsed is logged and left out of the result.

pub mod signature;

use rayon::prelude::*;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::SignatureMode;
use crate::error::{Error, Result};
use crate::metadata;
use crate::model::FileRecord;

/// Scan settings.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Lowercase extensions without the dot
    pub extensions: Vec<String>,
    pub signature: SignatureMode,
}

impl ScanOptions {
    pub fn new(extensions: &[String], signature: SignatureMode) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            signature,
        }
    }

    fn is_audio(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .map(|ext| {
                let ext = ext.to_lowercase();
                self.extensions.iter().any(|e| *e == ext)
            })
            .unwrap_or(false)
    }
}

/// Result of one scan.
#[derive(Debug, Default)]
pub struct ScanOutput {
    /// Records sorted by path
    pub records: Vec<FileRecord>,
    /// Files that matched an audio extension but could not be indexed
    pub skipped: usize,
}

/// Scan `root` recursively.
pub fn scan(root: &Path, options: &ScanOptions) -> Result<ScanOutput> {
    std::fs::read_dir(root).map_err(|e| Error::scan(root, e.to_string()))?;

    let paths: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(path = ?e.path(), "Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && options.is_audio(entry.path()))
        .filter(|entry| {
            // The state file keys records by path as a JSON string
            let utf8 = entry.path().to_str().is_some();
            if !utf8 {
                tracing::warn!(path = ?entry.path(), "Skipping non UTF-8 path");
            }
            utf8
        })
        .map(|entry| entry.into_path())
        .collect();

    let results: Vec<Result<FileRecord>> = paths
        .par_iter()
        .map(|path| index_file(path, options.signature))
        .collect();

    let mut output = ScanOutput::default();
    for result in results {
        match result {
            Ok(record) => output.records.push(record),
            Err(e) => {
                tracing::warn!(kind = e.kind(), "Skipping file: {}", e);
                output.skipped += 1;
            }
        }
    }
    output.records.sort_by(|a, b| a.path.cmp(&b.path));

    tracing::debug!(
        root = %root.display(),
        indexed = output.records.len(),
        skipped = output.skipped,
        "Scan complete"
    );
    Ok(output)
}

/// Build the record for a single file.
pub fn index_file(path: &Path, mode: SignatureMode) -> Result<FileRecord> {
    let signature =
        signature::compute(path, mode).map_err(|e| Error::file_read(path, e.to_string()))?;
    let tags = metadata::read_tags(path)?;
    Ok(FileRecord {
        path: path.to_path_buf(),
        signature,
        tags,
    })
}
