//! CLI command definitions and handlers.
//!
//! Each subcommand is implemented as a function that takes the resolved
//! configuration and returns an `anyhow::Result<()>`.

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::{self, Config};
use crate::daemon::{DaemonState, Pipeline, Scheduler};
use crate::enrichment::MetadataClient;
use crate::enrichment::musicbrainz::MusicBrainzClient;
use crate::state::StateStore;

/// Track Enricher: fills in missing audio tags in the background
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file (default: <config dir>/track-enricher/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Root of the music tree
    #[arg(long, global = true, env = "MUSIC_FOLDER")]
    pub music_folder: Option<PathBuf>,

    /// Seconds between scan cycles
    #[arg(long, global = true, env = "SCAN_INTERVAL")]
    pub interval: Option<u64>,

    /// State file location
    #[arg(long, global = true, env = "ENRICHER_STATE")]
    pub state: Option<PathBuf>,

    /// Look up metadata but never write to files
    #[arg(long, global = true)]
    pub dry_run: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run as a daemon, scanning on an interval (default)
    Run,
    /// Run a single cycle, print a summary and exit
    Once,
    /// Show what the state file knows without scanning
    Status {
        /// List every incomplete file instead of the first few
        #[arg(short, long)]
        all: bool,
    },
}

impl Cli {
    /// Apply command-line and environment overrides on top of `config`.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(folder) = &self.music_folder {
            config.library.music_folder = folder.clone();
        }
        if let Some(interval) = self.interval {
            config.schedule.scan_interval_secs = interval;
        }
        if let Some(state) = &self.state {
            config.state.path = state.clone();
        }
        if self.dry_run {
            config.enrichment.dry_run = true;
        }
    }

    /// Load, override and validate the configuration.
    pub fn resolve_config(&self) -> anyhow::Result<Config> {
        let mut config = config::load(self.config.as_deref())?;
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }
}

/// Run the specified CLI command.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let config = cli.resolve_config()?;

    match cli.command.clone().unwrap_or(Commands::Run) {
        Commands::Run => {
            let rt = Runtime::new()?;
            cmd_run(&rt, &config)
        }
        Commands::Once => {
            let rt = Runtime::new()?;
            cmd_once(&rt, &config)
        }
        Commands::Status { all } => cmd_status(&config, all),
    }
}

// ============================================================================
// Individual command implementations
// ============================================================================

fn cmd_run(rt: &Runtime, config: &Config) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config)?;
    info!(
        music_folder = %config.library.music_folder.display(),
        state = %config.state.path.display(),
        interval_secs = config.schedule.scan_interval_secs,
        dry_run = config.enrichment.dry_run,
        "Starting daemon"
    );

    rt.block_on(async {
        let shutdown = spawn_shutdown_listener();
        let scheduler = Scheduler::new(pipeline, config.scan_interval());

        let mut states = scheduler.subscribe();
        tokio::spawn(async move {
            while states.changed().await.is_ok() {
                let state = *states.borrow_and_update();
                tracing::debug!(target: "daemon", %state, "State changed");
            }
        });

        let summary = scheduler.run(shutdown).await;
        info!(
            cycles = summary.cycles,
            failed = summary.failed_cycles,
            "Daemon exited"
        );
    });
    Ok(())
}

fn cmd_once(rt: &Runtime, config: &Config) -> anyhow::Result<()> {
    let mut pipeline = build_pipeline(config)?;

    let stats = rt.block_on(async {
        let shutdown = spawn_shutdown_listener();
        let (state, _) = watch::channel(DaemonState::Idle);
        pipeline.run_cycle(&shutdown, &state).await
    })?;

    if config.enrichment.dry_run {
        println!("[DRY RUN - no files were modified]");
    }
    println!("{}", stats);
    Ok(())
}

fn cmd_status(config: &Config, all: bool) -> anyhow::Result<()> {
    const PREVIEW: usize = 10;

    let store = StateStore::new(&config.state.path);
    let state = store.load()?;
    let required = config.required_fields()?;
    let now = Utc::now();

    println!("State file:    {}", store.path().display());
    println!("Files tracked: {}", state.snapshot.len());

    let incomplete: Vec<_> = state
        .snapshot
        .records()
        .filter(|r| !r.tags.is_complete(required))
        .collect();
    println!(
        "Incomplete:    {} (required: {})",
        incomplete.len(),
        required.names().join(", ")
    );
    let shown = if all { incomplete.len() } else { PREVIEW };
    for record in incomplete.iter().take(shown) {
        println!(
            "  {}  missing: {}",
            record.path.display(),
            record.tags.missing(required).names().join(", ")
        );
    }
    if incomplete.len() > shown {
        println!("  ... {} more (use --all)", incomplete.len() - shown);
    }

    let suppressed = state.cooldowns.suppressed(now);
    println!("Cooling down:  {}", suppressed.len());
    for (path, until) in suppressed {
        println!("  {}  until {}", path.display(), until.format("%Y-%m-%d %H:%M UTC"));
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Wire the configured provider into a pipeline.
fn build_pipeline(config: &Config) -> anyhow::Result<Pipeline> {
    let root = &config.library.music_folder;
    if !root.is_dir() {
        anyhow::bail!("Music folder {} does not exist or is not a directory", root.display());
    }

    let provider = MusicBrainzClient::from_config(&config.lookup)
        .context("Failed to create metadata provider")?;
    let client = MetadataClient::from_config(Arc::new(provider), config);
    let pipeline = Pipeline::new(config, client, StateStore::new(&config.state.path))?;
    Ok(pipeline)
}

/// Flip a watch flag on SIGINT or SIGTERM.
fn spawn_shutdown_listener() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = tx.send(true);
        // Keep the sender alive so receivers see `true`, not a closed channel
        tx.closed().await;
    });
    rx
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, finishing current file and shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, finishing current file and shutting down");
        },
    }
}
