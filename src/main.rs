//! Track Enricher - keeps a music library's tags complete.
//!
//! Periodically scans a music folder, works out which files changed since
//! the last scan, looks up missing tags from an external metadata service
//! and writes them back safely. Run `track-enricher --help` for commands.

pub mod cli;
pub mod config;
pub mod daemon;
pub mod enrichment;
pub mod error;
pub mod metadata;
pub mod model;
pub mod scanner;
pub mod selector;
pub mod state;
#[cfg(test)]
pub mod test_utils;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive("track_enricher=info".parse()?)
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();

    cli::run_command(&args)
}
