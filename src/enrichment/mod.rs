//! Metadata lookups against an external service.
//!
//! # Architecture
//!
//! - **Domain models** (`domain.rs`) - our request/response types
//! - **Hints** (`hints.rs`) - query evidence from tags, filename and folders
//! - **Source trait** (`traits.rs`) - one request to one service
//! - **Client** (`client.rs`) - throttling, deadline and retries around a source
//! - **Providers** (`musicbrainz/`) - DTOs, adapter and HTTP client
//!
//! Providers never leak their response shapes past their adapter, so
//! swapping services does not touch the pipeline.

pub mod client;
pub mod domain;
pub mod hints;
pub mod musicbrainz;
pub mod rate_limit;
pub mod retry;
pub mod traits;

pub use client::MetadataClient;
pub use domain::{LookupError, LookupHints, LookupOutcome, MetadataResult};
pub use rate_limit::RateLimiter;
pub use retry::{RetryDecision, RetryPolicy, RetryState};
pub use traits::MetadataSource;
