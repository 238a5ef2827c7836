//! Background daemon: runs the enrichment cycle on a fixed interval.
//!
//! The [`Scheduler`] is a small state machine:
//!
//! ```text
//! Idle --tick--> Scanning --> Enriching --> Idle
//!   \                                        /
//!    `------------- shutdown ---> Stopped <-'
//! ```
//!
//! Cycles run back to back on one task, so a cycle never starts before
//! the previous one has finished writing. A tick that comes due while a
//! cycle is still running is skipped, not queued.

pub mod cycle;

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

pub use cycle::{CycleStats, Pipeline};

/// Where the daemon currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Idle,
    Scanning,
    Enriching,
    Stopped,
}

impl std::fmt::Display for DaemonState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DaemonState::Idle => write!(f, "idle"),
            DaemonState::Scanning => write!(f, "scanning"),
            DaemonState::Enriching => write!(f, "enriching"),
            DaemonState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Totals over the daemon's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: usize,
    pub failed_cycles: usize,
}

/// Drives [`Pipeline`] cycles until shutdown.
pub struct Scheduler {
    pipeline: Pipeline,
    interval: Duration,
    state: watch::Sender<DaemonState>,
}

impl Scheduler {
    pub fn new(pipeline: Pipeline, interval: Duration) -> Self {
        let (state, _) = watch::channel(DaemonState::Idle);
        Self {
            pipeline,
            interval,
            state,
        }
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<DaemonState> {
        self.state.subscribe()
    }

    /// Run until `shutdown` turns true or its sender is dropped.
    ///
    /// The first cycle starts immediately. A failed cycle is logged and the
    /// daemon waits for the next tick.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> RunSummary {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut summary = RunSummary::default();

        tracing::info!(
            target: "daemon",
            interval_secs = self.interval.as_secs(),
            "Scheduler started"
        );

        loop {
            // Shutdown wins over a tick that is already due
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {}
            }
            if *shutdown.borrow() {
                break;
            }

            tracing::debug!(target: "daemon", cycle = summary.cycles + 1, "Cycle starting");
            match self.pipeline.run_cycle(&shutdown, &self.state).await {
                Ok(stats) => {
                    tracing::info!(
                        target: "daemon",
                        scanned = stats.scanned,
                        new = stats.new,
                        modified = stats.modified,
                        deleted = stats.deleted,
                        candidates = stats.candidates,
                        suppressed = stats.suppressed,
                        enriched = stats.enriched,
                        not_found = stats.not_found,
                        lookup_failed = stats.lookup_failed,
                        write_failed = stats.write_failed,
                        no_hints = stats.no_hints,
                        skipped_on_shutdown = stats.skipped_on_shutdown,
                        "Cycle complete"
                    );
                }
                Err(e) => {
                    summary.failed_cycles += 1;
                    tracing::error!(target: "daemon", kind = e.kind(), "Cycle failed: {}", e);
                }
            }
            summary.cycles += 1;
            self.state.send_replace(DaemonState::Idle);
        }

        self.state.send_replace(DaemonState::Stopped);
        tracing::info!(target: "daemon", cycles = summary.cycles, "Scheduler stopped");
        summary
    }
}
