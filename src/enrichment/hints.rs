//! Lookup hints from a file's tags, filename and folder layout.
//!
//! Precedence is embedded tags, then the filename, then the folders. The
//! filename parser understands:
//!
//! - `Artist - Title - <video id>` (11 chars of `[A-Za-z0-9_-]`, discarded)
//! - `Artist - Title`
//! - `NN - Title` and `NN. Title` (leading track number is dropped)
//! - `Title`
//!
//! A bare track number (`03`) yields no title at all.
//!
//! For `<root>/<Artist>/<Album>/file`, the folders become weak artist and
//! album hints.

use std::path::Path;

use super::domain::LookupHints;
use crate::model::FileRecord;

const VIDEO_ID_LEN: usize = 11;

/// Pieces recovered from a file stem.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilenameHints {
    pub artist: Option<String>,
    pub title: Option<String>,
}

/// Build hints for a record under `root`.
pub fn build(record: &FileRecord, root: &Path) -> LookupHints {
    let from_name = record
        .path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(parse_file_stem)
        .unwrap_or_default();

    let (folder_artist, folder_album) = folder_hints(&record.path, root);

    LookupHints {
        path: record.path.clone(),
        title: record.tags.title.clone().or(from_name.title),
        artist: record
            .tags
            .artist
            .clone()
            .or(from_name.artist)
            .or(folder_artist),
        album: record.tags.album.clone().or(folder_album),
    }
}

/// Parse a filename stem.
pub fn parse_file_stem(stem: &str) -> FilenameHints {
    let rest = strip_video_id(stem.trim());

    let parts: Vec<&str> = rest
        .split(" - ")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let (artist, title) = match parts.as_slice() {
        [] => (None, None),
        [single] if is_track_number(single) => (None, None),
        [single] => (None, Some(strip_track_prefix(single))),
        [first, tail @ ..] if is_track_number(first) => (None, Some(tail.join(" - "))),
        [first, tail @ ..] => (Some(first.to_string()), Some(tail.join(" - "))),
    };

    FilenameHints {
        artist,
        title: title.filter(|t| !t.is_empty()),
    }
}

/// Drop a trailing `-<id>` from the stem.
fn strip_video_id(stem: &str) -> &str {
    if stem.len() <= VIDEO_ID_LEN || !stem.is_char_boundary(stem.len() - VIDEO_ID_LEN) {
        return stem;
    }
    let (head, id) = stem.split_at(stem.len() - VIDEO_ID_LEN);
    let is_id = id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    let head = head.trim_end();
    match head.strip_suffix('-') {
        Some(before) if is_id => before.trim_end(),
        _ => stem,
    }
}

fn is_track_number(s: &str) -> bool {
    s.len() <= 3 && s.chars().all(|c| c.is_ascii_digit())
}

/// Drop a `NN. ` prefix.
fn strip_track_prefix(s: &str) -> String {
    if let Some((num, rest)) = s.split_once(". ")
        && is_track_number(num)
        && !rest.trim().is_empty()
    {
        return rest.trim().to_string();
    }
    s.to_string()
}

fn folder_hints(path: &Path, root: &Path) -> (Option<String>, Option<String>) {
    let Ok(relative) = path.strip_prefix(root) else {
        return (None, None);
    };
    let dirs: Vec<String> = relative
        .parent()
        .map(|p| {
            p.components()
                .filter_map(|c| c.as_os_str().to_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    match dirs.as_slice() {
        [.., artist, album] => (Some(artist.clone()), Some(album.clone())),
        [album] => (None, Some(album.clone())),
        [] => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EmbeddedTags;
    use crate::test_utils::mock_record;
    use proptest::prelude::*;

    #[test]
    fn test_parse_artist_title_video_id() {
        let hints = parse_file_stem("Kavinsky - Nightcall - MV_3Dpw-BRY");
        assert_eq!(hints.artist.as_deref(), Some("Kavinsky"));
        assert_eq!(hints.title.as_deref(), Some("Nightcall"));
    }

    #[test]
    fn test_parse_video_id_without_spaces() {
        let hints = parse_file_stem("Kavinsky - Nightcall-MV_3Dpw-BRY");
        assert_eq!(hints.title.as_deref(), Some("Nightcall"));
    }

    #[test]
    fn test_short_trailing_word_is_kept_in_title() {
        let hints = parse_file_stem("Kavinsky - Nightcall - Remix");
        assert_eq!(hints.title.as_deref(), Some("Nightcall - Remix"));
    }

    #[test]
    fn test_parse_artist_title() {
        let hints = parse_file_stem("The Midnight - Los Angeles");
        assert_eq!(hints.artist.as_deref(), Some("The Midnight"));
        assert_eq!(hints.title.as_deref(), Some("Los Angeles"));
    }

    #[test]
    fn test_parse_title_with_dash_inside() {
        let hints = parse_file_stem("FM-84 - Running In The Night - Extended Mix");
        assert_eq!(hints.artist.as_deref(), Some("FM-84"));
        assert_eq!(hints.title.as_deref(), Some("Running In The Night - Extended Mix"));
    }

    #[test]
    fn test_parse_track_number_prefixes() {
        let hints = parse_file_stem("03 - Sunset");
        assert_eq!(hints.artist, None);
        assert_eq!(hints.title.as_deref(), Some("Sunset"));

        let hints = parse_file_stem("07. Turbo Killer");
        assert_eq!(hints.title.as_deref(), Some("Turbo Killer"));
    }

    #[test]
    fn test_parse_plain_title() {
        let hints = parse_file_stem("Resonance");
        assert_eq!(hints.artist, None);
        assert_eq!(hints.title.as_deref(), Some("Resonance"));
    }

    #[test]
    fn test_bare_track_number_has_no_title() {
        assert_eq!(parse_file_stem("03"), FilenameHints::default());
    }

    #[test]
    fn test_build_prefers_tags_then_filename_then_folders() {
        let root = Path::new("/music");
        let record = mock_record(
            "/music/Folder Artist/Folder Album/Name Artist - Name Title.mp3",
            1,
            1,
            EmbeddedTags {
                title: Some("Tag Title".to_string()),
                ..Default::default()
            },
        );

        let hints = build(&record, root);
        assert_eq!(hints.title.as_deref(), Some("Tag Title"));
        assert_eq!(hints.artist.as_deref(), Some("Name Artist"));
        assert_eq!(hints.album.as_deref(), Some("Folder Album"));
    }

    #[test]
    fn test_build_uses_folder_artist_when_filename_has_none() {
        let root = Path::new("/music");
        let record = mock_record(
            "/music/Perturbator/Dangerous Days/05 - Sentient.mp3",
            1,
            1,
            EmbeddedTags::default(),
        );

        let hints = build(&record, root);
        assert_eq!(hints.title.as_deref(), Some("Sentient"));
        assert_eq!(hints.artist.as_deref(), Some("Perturbator"));
        assert_eq!(hints.album.as_deref(), Some("Dangerous Days"));
    }

    #[test]
    fn test_file_at_root_has_no_folder_hints() {
        let record = mock_record("/music/Song.mp3", 1, 1, EmbeddedTags::default());
        let hints = build(&record, Path::new("/music"));
        assert_eq!(hints.album, None);
        assert_eq!(hints.artist, None);
    }

    proptest! {
        #[test]
        fn prop_parse_never_panics(stem in "\\PC{0,60}") {
            let _ = parse_file_stem(&stem);
        }

        #[test]
        fn prop_recovers_constructed_names(
            artist in "[A-Za-z][A-Za-z ]{0,15}[A-Za-z]",
            title in "[A-Za-z][A-Za-z ]{0,15}[A-Za-z]",
            id in "[A-Za-z0-9_-]{11}",
        ) {
            let hints = parse_file_stem(&format!("{artist} - {title} - {id}"));
            prop_assert_eq!(hints.artist.as_deref(), Some(artist.trim()));
            prop_assert_eq!(hints.title.as_deref(), Some(title.trim()));
        }
    }
}
