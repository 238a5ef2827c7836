//! Application-wide error types.
//!
//! Library modules use specific error types via `thiserror`, while
//! the CLI and `main` use `anyhow` for convenient error propagation.
//!
//! # Taxonomy
//!
//! - [`Error::Scan`]: the music root is unreadable. Fatal for the cycle.
//! - [`Error::FileRead`]: one file could not be read. The file is skipped.
//! - [`Error::Lookup`]: the metadata service failed. See [`LookupError`].
//! - [`Error::Write`]: tag write-back failed. The original is untouched.
//! - [`Error::State`]: the state store could not be read or replaced.
//!
//! A "not found" lookup is not an error and has no variant here.

use std::path::PathBuf;

use crate::enrichment::LookupError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Music root unreadable
    #[error("Cannot scan {root}: {message}")]
    Scan { root: PathBuf, message: String },

    /// Single file unreadable or its tag container is corrupt
    #[error("Cannot read {path}: {message}")]
    FileRead { path: PathBuf, message: String },

    /// Metadata service failure
    #[error("Lookup failed: {0}")]
    Lookup(#[from] LookupError),

    /// Tag write-back failed
    #[error("Write failed for {path}: {message}")]
    Write { path: PathBuf, message: String },

    /// State store failure
    #[error("State store error at {path}: {message}")]
    State { path: PathBuf, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn scan(root: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Scan {
            root: root.into(),
            message: message.into(),
        }
    }

    pub fn file_read(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::FileRead {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn write(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Write {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn state(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::State {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Short, stable name of the error kind for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Scan { .. } => "scan",
            Self::FileRead { .. } => "file_read",
            Self::Lookup(_) => "lookup",
            Self::Write { .. } => "write",
            Self::State { .. } => "state",
            Self::Config(_) => "config",
            Self::WithContext { source, .. } => source.kind(),
        }
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}
