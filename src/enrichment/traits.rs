//! Trait definition for metadata services.
//!
//! The lookup client only talks to a [`MetadataSource`], so the pipeline
//! can run against a scripted source in tests.

use async_trait::async_trait;

use super::domain::{LookupError, LookupHints, LookupOutcome};

/// One request to an external metadata service.
///
/// Implementations perform a single attempt. Throttling, deadlines and
/// retries are layered on top by [`super::client::MetadataClient`].
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn lookup(&self, hints: &LookupHints) -> Result<LookupOutcome, LookupError>;
}

#[async_trait]
impl MetadataSource for super::musicbrainz::MusicBrainzClient {
    async fn lookup(&self, hints: &LookupHints) -> Result<LookupOutcome, LookupError> {
        self.search_recording(hints).await
    }
}
