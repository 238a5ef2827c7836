//! Core data models shared by the enrichment pipeline.
//!
//! - [`FileRecord`] - one audio file as seen by a single scan
//! - [`EmbeddedTags`] - the recognized tag fields, each optional
//! - [`FieldSet`] - a set of recognized tag field names
//!
//! Records are serialized into the persisted snapshot, so field names
//! here are part of the state file format.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

bitflags! {
    /// A set of recognized tag fields.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct FieldSet: u16 {
        const TITLE = 1 << 0;
        const ARTIST = 1 << 1;
        const ALBUM = 1 << 2;
        const ALBUM_ARTIST = 1 << 3;
        const TRACK_NUMBER = 1 << 4;
        const TRACK_TOTAL = 1 << 5;
        const DISC_NUMBER = 1 << 6;
        const YEAR = 1 << 7;
        const GENRE = 1 << 8;
    }
}

/// Config-facing names of each field, in display order.
const FIELD_NAMES: &[(FieldSet, &str)] = &[
    (FieldSet::TITLE, "title"),
    (FieldSet::ARTIST, "artist"),
    (FieldSet::ALBUM, "album"),
    (FieldSet::ALBUM_ARTIST, "album_artist"),
    (FieldSet::TRACK_NUMBER, "track_number"),
    (FieldSet::TRACK_TOTAL, "track_total"),
    (FieldSet::DISC_NUMBER, "disc_number"),
    (FieldSet::YEAR, "year"),
    (FieldSet::GENRE, "genre"),
];

impl FieldSet {
    /// Parse a list of field names (case-insensitive, `-` or `_` separated).
    ///
    /// Returns the first unrecognized name as the error.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, String> {
        let mut set = FieldSet::empty();
        for name in names {
            let normalized = name.as_ref().trim().to_lowercase().replace('-', "_");
            let field = FIELD_NAMES
                .iter()
                .find(|(_, n)| *n == normalized)
                .map(|(f, _)| *f)
                .ok_or_else(|| name.as_ref().to_string())?;
            set |= field;
        }
        Ok(set)
    }

    /// Field names contained in this set.
    pub fn names(&self) -> Vec<&'static str> {
        FIELD_NAMES
            .iter()
            .filter(|(f, _)| self.contains(*f))
            .map(|(_, n)| *n)
            .collect()
    }
}

/// Embedded tag values for the recognized field set.
///
/// Empty strings are normalized to `None` on read, so `is_some()` means
/// the field is actually populated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddedTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub track_number: Option<u32>,
    pub track_total: Option<u32>,
    pub disc_number: Option<u32>,
    pub year: Option<u32>,
    pub genre: Option<String>,
}

impl EmbeddedTags {
    /// The set of fields that currently hold a value.
    pub fn present(&self) -> FieldSet {
        let mut set = FieldSet::empty();
        set.set(FieldSet::TITLE, self.title.is_some());
        set.set(FieldSet::ARTIST, self.artist.is_some());
        set.set(FieldSet::ALBUM, self.album.is_some());
        set.set(FieldSet::ALBUM_ARTIST, self.album_artist.is_some());
        set.set(FieldSet::TRACK_NUMBER, self.track_number.is_some());
        set.set(FieldSet::TRACK_TOTAL, self.track_total.is_some());
        set.set(FieldSet::DISC_NUMBER, self.disc_number.is_some());
        set.set(FieldSet::YEAR, self.year.is_some());
        set.set(FieldSet::GENRE, self.genre.is_some());
        set
    }

    /// Required fields that are not populated.
    pub fn missing(&self, required: FieldSet) -> FieldSet {
        required - self.present()
    }

    pub fn is_complete(&self, required: FieldSet) -> bool {
        self.missing(required).is_empty()
    }

    /// Copy of `self` restricted to the given fields.
    pub fn only(&self, fields: FieldSet) -> EmbeddedTags {
        let pick = |f: FieldSet| fields.contains(f);
        EmbeddedTags {
            title: self.title.clone().filter(|_| pick(FieldSet::TITLE)),
            artist: self.artist.clone().filter(|_| pick(FieldSet::ARTIST)),
            album: self.album.clone().filter(|_| pick(FieldSet::ALBUM)),
            album_artist: self
                .album_artist
                .clone()
                .filter(|_| pick(FieldSet::ALBUM_ARTIST)),
            track_number: self.track_number.filter(|_| pick(FieldSet::TRACK_NUMBER)),
            track_total: self.track_total.filter(|_| pick(FieldSet::TRACK_TOTAL)),
            disc_number: self.disc_number.filter(|_| pick(FieldSet::DISC_NUMBER)),
            year: self.year.filter(|_| pick(FieldSet::YEAR)),
            genre: self.genre.clone().filter(|_| pick(FieldSet::GENRE)),
        }
    }
}

/// Fingerprint used to detect change between scans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// File size in bytes
    pub size: u64,
    /// Modification time, nanoseconds since the Unix epoch
    pub mtime_ns: i128,
    /// Partial content hash, only present in content signature mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

impl Signature {
    /// Cheap comparison on size and mtime only.
    pub fn same_stat(&self, other: &Signature) -> bool {
        self.size == other.size && self.mtime_ns == other.mtime_ns
    }
}

/// One audio file as observed by a scan.
///
/// Identity is the absolute path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub signature: Signature,
    #[serde(default)]
    pub tags: EmbeddedTags,
}
