//! Test utilities and fixtures.
//!
//! Provides a synthetic MP3 stream that lofty can parse and tag, plus
//! record builders, so tests do not need binary fixtures on disk.
//!
//! # Example
//!
//! ```ignore
//! use crate::test_utils::{write_silent_mp3, mock_record};
//!
//! let dir = tempfile::tempdir().unwrap();
//! write_silent_mp3(&dir.path().join("a.mp3"));
//! ```

use std::path::Path;

use crate::model::{EmbeddedTags, FileRecord, Signature};

/// MPEG-1 Layer III, 128 kbps, 44.1 kHz, joint stereo, no CRC, no padding.
const FRAME_HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0x64];
/// 144 * 128000 / 44100, rounded down
const FRAME_LEN: usize = 417;
const FRAME_COUNT: usize = 40;

/// Write a short stream of silent MPEG frames to `path`.
pub fn write_silent_mp3(path: &Path) {
    let mut data = Vec::with_capacity(FRAME_LEN * FRAME_COUNT);
    for _ in 0..FRAME_COUNT {
        data.extend_from_slice(&FRAME_HEADER);
        data.resize(data.len() + FRAME_LEN - FRAME_HEADER.len(), 0);
    }
    std::fs::write(path, data).expect("Failed to write fixture mp3");
}

/// Write a silent MP3 carrying the given tags.
pub fn write_tagged_mp3(path: &Path, tags: &EmbeddedTags) {
    write_silent_mp3(path);
    crate::metadata::write(path, tags).expect("Failed to tag fixture mp3");
}

/// Tags with title, artist and album populated.
pub fn complete_tags() -> EmbeddedTags {
    EmbeddedTags {
        title: Some("Test Track".to_string()),
        artist: Some("Test Artist".to_string()),
        album: Some("Test Album".to_string()),
        track_number: Some(1),
        ..Default::default()
    }
}

/// A record that does not touch the filesystem.
pub fn mock_record(path: &str, size: u64, mtime_ns: i128, tags: EmbeddedTags) -> FileRecord {
    FileRecord {
        path: path.into(),
        signature: Signature {
            size,
            mtime_ns,
            content_hash: None,
        },
        tags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldSet;

    #[test]
    fn test_silent_mp3_is_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.mp3");
        write_silent_mp3(&path);

        let tags = crate::metadata::read_tags(&path).unwrap();
        assert!(tags.present().is_empty());
    }

    #[test]
    fn test_tagged_mp3_has_tags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.mp3");
        write_tagged_mp3(&path, &complete_tags());

        let tags = crate::metadata::read_tags(&path).unwrap();
        assert!(tags.is_complete(FieldSet::TITLE | FieldSet::ARTIST | FieldSet::ALBUM));
    }

    #[test]
    fn test_mock_record_defaults() {
        let record = mock_record("/music/a.mp3", 10, 20, EmbeddedTags::default());
        assert_eq!(record.signature.size, 10);
        assert!(record.signature.content_hash.is_none());
    }
}
