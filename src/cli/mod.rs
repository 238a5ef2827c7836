//! Command-line interface for track-enricher.
//!
//! `run` (the default) starts the daemon, `once` runs a single cycle and
//! `status` reports on the state file without scanning.

mod commands;

pub use commands::{Cli, run_command};
