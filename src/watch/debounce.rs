//! Per-path debounce tracking for the intake watcher.
//!
//! Every create/modify event (re)starts a path's quiet-period timer; a
//! close-for-write or move-into-directory event bypasses the timer entirely.
//! The transition table is observed -> debouncing -> settled, driven by
//! `touch`/`finish` plus a periodic `check_settled` sweep, so the logic is
//! unit-testable without a real filesystem.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error};

pub struct DebounceTracker {
    /// Map of path to the instant of its most recent event.
    pending: HashMap<PathBuf, Instant>,
    /// How long a path must be quiet to be considered settled.
    quiet_period: Duration,
    /// Channel receiving settled paths.
    settled_tx: mpsc::Sender<PathBuf>,
}

impl DebounceTracker {
    pub fn new(quiet_period: Duration, settled_tx: mpsc::Sender<PathBuf>) -> Self {
        Self {
            pending: HashMap::new(),
            quiet_period,
            settled_tx,
        }
    }

    /// Record an event for a path, restarting its quiet-period timer.
    pub fn touch(&mut self, path: PathBuf) {
        self.pending.insert(path, Instant::now());
    }

    /// A path was closed for writing or moved into the directory: it is
    /// settled immediately, any running timer is cancelled.
    pub async fn finish(&mut self, path: PathBuf) {
        self.pending.remove(&path);
        self.send_settled(path).await;
    }

    /// Sweep for paths whose timers have expired without a new event.
    pub async fn check_settled(&mut self) {
        let now = Instant::now();
        let settled: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, last_event)| now.duration_since(**last_event) >= self.quiet_period)
            .map(|(path, _)| path.clone())
            .collect();

        for path in settled {
            self.pending.remove(&path);
            self.send_settled(path).await;
        }
    }

    async fn send_settled(&self, path: PathBuf) {
        debug!("Path settled: {:?}", path);
        if let Err(e) = self.settled_tx.send(path).await {
            error!("Failed to hand off settled path: {}", e);
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.pending.len()
    }
}
