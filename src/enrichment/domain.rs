//! Internal domain models for metadata lookups.
//!
//! These types are OUR types - they don't change when a provider's API
//! changes. Provider responses get converted into these via adapters.

use std::path::PathBuf;

use crate::model::EmbeddedTags;

/// Local evidence about a file, used to build a query.
///
/// Existing tags are strong hints; filename and folder names are weak ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupHints {
    pub path: PathBuf,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
}

impl LookupHints {
    /// Whether there is enough to form a query.
    pub fn is_searchable(&self) -> bool {
        self.title.is_some()
    }
}

/// A matched set of canonical tag fields.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataResult {
    pub fields: EmbeddedTags,
    /// Match confidence (0.0 to 1.0)
    pub confidence: f32,
    /// Provider identifier of the match
    pub source_id: Option<String>,
}

/// Successful outcome of a lookup call.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Found(MetadataResult),
    /// The service answered and had no match
    NotFound,
}

/// Errors that can occur while talking to a metadata service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error: HTTP {status}")]
    Server { status: u16 },

    #[error("Rate limited - try again later")]
    RateLimited,

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl LookupError {
    /// Transient failures are retried with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LookupError::Timeout
                | LookupError::Network(_)
                | LookupError::Server { .. }
                | LookupError::RateLimited
        )
    }
}
