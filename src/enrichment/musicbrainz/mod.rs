//! MusicBrainz API integration
//!
//! Recording search by title, artist and album hints. This is the default
//! metadata source for the daemon.
//!
//! API docs: https://musicbrainz.org/doc/MusicBrainz_API

pub mod dto;
mod adapter;
mod client;

pub use adapter::best_match;
pub use client::{MusicBrainzClient, build_query};

/// Public MusicBrainz web service root
pub const DEFAULT_BASE_URL: &str = "https://musicbrainz.org/ws/2";

/// User agent string - MusicBrainz requires this
pub const DEFAULT_USER_AGENT: &str = concat!("track-enricher/", env!("CARGO_PKG_VERSION"));
