//! Adapter layer: Convert MusicBrainz DTOs to domain models
//!
//! This is the ONLY place where DTO types are converted to domain types.
//! This isolates API changes - if MusicBrainz changes their response format,
//! only this file and dto.rs need to change.

use super::dto;
use crate::enrichment::domain::MetadataResult;
use crate::model::EmbeddedTags;

/// Release-derived fields for one recording
#[derive(Default)]
struct ReleaseInfo {
    album: Option<String>,
    album_artist: Option<String>,
    track_number: Option<u32>,
    track_total: Option<u32>,
    disc_number: Option<u32>,
    year: Option<u32>,
}

/// Pick the highest-scoring recording of a search response.
pub fn best_match(response: dto::SearchResponse) -> Option<MetadataResult> {
    response
        .recordings
        .into_iter()
        .max_by_key(|r| r.score.unwrap_or(0))
        .map(to_result)
}

/// Convert one search hit to a MetadataResult
pub fn to_result(recording: dto::Recording) -> MetadataResult {
    let release = extract_release_info(&recording.releases);

    let fields = EmbeddedTags {
        title: Some(recording.title).filter(|t| !t.trim().is_empty()),
        artist: build_artist_string(&recording.artist_credit),
        album: release.album,
        album_artist: release.album_artist,
        track_number: release.track_number,
        track_total: release.track_total,
        disc_number: release.disc_number,
        year: release.year,
        genre: top_genre(&recording.tags),
    };

    MetadataResult {
        fields,
        // Search scores are 0-100
        confidence: recording.score.unwrap_or(0).min(100) as f32 / 100.0,
        source_id: Some(recording.id),
    }
}

/// Build a combined artist string from artist credits
fn build_artist_string(credits: &[dto::ArtistCredit]) -> Option<String> {
    if credits.is_empty() {
        return None;
    }

    let mut result = String::new();
    for credit in credits {
        // Use credited name if available, otherwise official name
        let name = credit.name.as_ref().unwrap_or(&credit.artist.name);
        result.push_str(name);

        // Add join phrase if present (e.g., " & ", " feat. ")
        if let Some(ref join) = credit.joinphrase {
            result.push_str(join);
        }
    }

    Some(result.trim().to_string()).filter(|s| !s.is_empty())
}

/// Extract the best release info from available releases
fn extract_release_info(releases: &[dto::Release]) -> ReleaseInfo {
    // Prefer official album releases over singles/bootlegs
    let release = releases
        .iter()
        .find(|r| {
            r.status.as_deref() == Some("Official")
                && r.release_group
                    .as_ref()
                    .and_then(|rg| rg.primary_type.as_deref())
                    == Some("Album")
        })
        .or_else(|| {
            releases
                .iter()
                .find(|r| r.status.as_deref() == Some("Official"))
        })
        .or_else(|| releases.first());

    let Some(release) = release else {
        return ReleaseInfo::default();
    };

    let album_artist = release
        .artist_credit
        .as_ref()
        .and_then(|credits| build_artist_string(credits));

    // Search results only carry the medium holding the matched track
    let (track_number, track_total, disc_number) = release
        .media
        .first()
        .map(|m| {
            let number = m
                .tracks
                .first()
                .and_then(|t| t.number.as_deref())
                .and_then(parse_track_number)
                .or_else(|| m.track_offset.map(|offset| offset + 1));
            // Disc 1 of a single-disc release is noise
            let disc = m.position.filter(|&p| p > 1);
            (number, m.track_count, disc)
        })
        .unwrap_or((None, None, None));

    // Parse year from date (YYYY, YYYY-MM, or YYYY-MM-DD)
    let year = release
        .date
        .as_ref()
        .and_then(|d| d.split('-').next())
        .and_then(|y| y.parse().ok());

    ReleaseInfo {
        album: Some(release.title.clone()),
        album_artist,
        track_number,
        track_total,
        disc_number,
        year,
    }
}

/// Track numbers may be printed as "5", "1-5" or "A3".
fn parse_track_number(number: &str) -> Option<u32> {
    let tail = number.rsplit('-').next().unwrap_or(number);
    tail.trim().parse().ok().filter(|&n| n > 0)
}

/// Most-voted tag, capitalized for display
fn top_genre(tags: &[dto::Tag]) -> Option<String> {
    tags.iter()
        .filter(|t| t.count > 0)
        .max_by_key(|t| t.count)
        .map(|t| {
            t.name
                .split_whitespace()
                .map(|word| {
                    let mut chars = word.chars();
                    match chars.next() {
                        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                        None => String::new(),
                    }
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
}
