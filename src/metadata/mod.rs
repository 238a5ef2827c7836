//! Audio file tag reading and atomic write-back.
//!
//! Uses the lofty crate for format-independent metadata access. Only the
//! recognized field set in [`EmbeddedTags`] is ever touched; every other
//! item in the tag (comments, pictures, custom frames) is carried through.
//!
//! # Write discipline
//!
//! 1. Copy the original to a hidden sibling temp file (same directory, so
//!    the final rename stays on one filesystem).
//! 2. Apply the tag changes to the temp file.
//! 3. Re-read the temp file and verify every written field.
//! 4. Carry over ownership, then rename the temp file over the original.
//!
//! Any failure removes the temp file and leaves the original untouched.

use lofty::config::WriteOptions;
use lofty::file::{TaggedFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag, TagExt};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::model::{EmbeddedTags, FieldSet};

/// Suffix of in-flight write targets. Not an audio extension, so the
/// scanner never indexes a leftover.
const TEMP_SUFFIX: &str = "enrich-tmp";

/// Result of a write operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    /// Fields that were written
    pub fields_written: FieldSet,
}

/// Read the recognized tag fields of an audio file.
///
/// A file without any tag yields empty [`EmbeddedTags`]. A file that
/// cannot be opened or parsed is a [`Error::FileRead`].
pub fn read_tags(path: &Path) -> Result<EmbeddedTags> {
    let tagged_file = probe(path).map_err(|e| Error::file_read(path, e))?;

    let Some(tag) = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())
    else {
        return Ok(EmbeddedTags::default());
    };

    Ok(tags_from(tag))
}

/// Open and parse a file, detecting the format from its content.
fn probe(path: &Path) -> std::result::Result<TaggedFile, String> {
    Probe::open(path)
        .map_err(|e| e.to_string())?
        .guess_file_type()
        .map_err(|e| e.to_string())?
        .read()
        .map_err(|e| e.to_string())
}

fn tags_from(tag: &Tag) -> EmbeddedTags {
    let text = |value: Option<std::borrow::Cow<'_, str>>| {
        value
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    let album_artist = tag
        .items()
        .find(|item| matches!(item.key(), ItemKey::AlbumArtist))
        .and_then(|item| item.value().text())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    EmbeddedTags {
        title: text(tag.title()),
        artist: text(tag.artist()),
        album: text(tag.album()),
        album_artist,
        track_number: tag.track().filter(|n| *n > 0),
        track_total: tag.track_total().filter(|n| *n > 0),
        disc_number: tag.disk().filter(|n| *n > 0),
        year: tag.year().filter(|y| *y > 0),
        genre: text(tag.genre()),
    }
}

/// Decide which provider fields to write given what the file already has.
///
/// With `overwrite` off, only empty fields are filled. Fields whose value
/// would not change are never written.
pub fn fields_to_write(
    existing: &EmbeddedTags,
    found: &EmbeddedTags,
    overwrite: bool,
) -> EmbeddedTags {
    let selected = FieldSet::from_iter(found.present().iter().filter(|field| {
        let current = existing.only(*field);
        current != found.only(*field) && (overwrite || current.present().is_empty())
    }));
    found.only(selected)
}

/// Apply `fields` to the file's primary tag, all-or-nothing.
///
/// Only fields that are `Some` in `fields` are touched.
pub fn write(path: &Path, fields: &EmbeddedTags) -> Result<WriteReport> {
    let wanted = fields.present();
    if wanted.is_empty() {
        return Ok(WriteReport {
            fields_written: FieldSet::empty(),
        });
    }

    let temp = temp_path(path)?;
    match write_via_temp(path, &temp, fields) {
        Ok(()) => Ok(WriteReport {
            fields_written: wanted,
        }),
        Err(e) => {
            if temp.is_file() {
                let _ = std::fs::remove_file(&temp);
            }
            Err(e)
        }
    }
}

fn write_via_temp(path: &Path, temp: &Path, fields: &EmbeddedTags) -> Result<()> {
    std::fs::copy(path, temp)
        .map_err(|e| Error::write(path, format!("cannot create temp copy: {e}")))?;

    apply_fields(temp, fields).map_err(|e| Error::write(path, e))?;

    // Verify before touching the original
    let written = read_tags(temp).map_err(|e| Error::write(path, e.to_string()))?;
    let wanted = fields.present();
    if written.only(wanted) != *fields {
        return Err(Error::write(path, "verification of written tags failed"));
    }

    preserve_ownership(path, temp);
    sync_file(temp).map_err(|e| Error::write(path, format!("cannot flush temp copy: {e}")))?;

    std::fs::rename(temp, path)
        .map_err(|e| Error::write(path, format!("cannot replace original: {e}")))?;
    Ok(())
}

fn apply_fields(target: &Path, fields: &EmbeddedTags) -> std::result::Result<(), String> {
    let mut tagged_file = probe(target).map_err(|e| format!("cannot parse copy: {e}"))?;

    let tag_type = tagged_file.primary_tag_type();
    if tagged_file.tag(tag_type).is_none() {
        tagged_file.insert_tag(Tag::new(tag_type));
    }
    let tag = tagged_file
        .tag_mut(tag_type)
        .ok_or_else(|| "no writable tag for this format".to_string())?;

    if let Some(ref title) = fields.title {
        tag.set_title(title.clone());
    }
    if let Some(ref artist) = fields.artist {
        tag.set_artist(artist.clone());
    }
    if let Some(ref album) = fields.album {
        tag.set_album(album.clone());
    }
    if let Some(ref album_artist) = fields.album_artist {
        tag.insert_text(ItemKey::AlbumArtist, album_artist.clone());
    }
    if let Some(track) = fields.track_number {
        tag.set_track(track);
    }
    if let Some(total) = fields.track_total {
        tag.set_track_total(total);
    }
    if let Some(disc) = fields.disc_number {
        tag.set_disk(disc);
    }
    if let Some(year) = fields.year {
        tag.set_year(year);
    }
    if let Some(ref genre) = fields.genre {
        tag.set_genre(genre.clone());
    }

    tag.save_to_path(target, WriteOptions::default())
        .map_err(|e| format!("cannot save tags: {e}"))
}

/// Flush a file's data to disk so a rename never exposes a partial file.
fn sync_file(path: &Path) -> std::io::Result<()> {
    std::fs::OpenOptions::new().write(true).open(path)?.sync_all()
}

/// Hidden sibling path used as the write target.
pub fn temp_path(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| Error::write(path, "path has no file name"))?;
    let mut temp_name = std::ffi::OsString::from(".");
    temp_name.push(name);
    temp_name.push(".");
    temp_name.push(TEMP_SUFFIX);
    Ok(path.with_file_name(temp_name))
}

#[cfg(unix)]
fn preserve_ownership(original: &Path, temp: &Path) {
    use std::os::unix::fs::MetadataExt;

    let Ok(meta) = std::fs::metadata(original) else {
        return;
    };
    if let Err(e) = std::os::unix::fs::chown(temp, Some(meta.uid()), Some(meta.gid())) {
        tracing::debug!(path = %original.display(), "Could not carry over ownership: {}", e);
    }
}

#[cfg(not(unix))]
fn preserve_ownership(_original: &Path, _temp: &Path) {}
