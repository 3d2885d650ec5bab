//! Intake directory watcher.
//!
//! Subscribes to filesystem notifications for the intake directory
//! (non-recursive), debounces rapid successive events per path, and hands
//! settled paths to the ingest queue. Close-for-write and move-into events
//! skip the debounce since the platform has told us writing is done.

mod debounce;

pub use debounce::DebounceTracker;

use crate::config::IntakeConfig;
use crate::ingest::{is_supported, IngestQueue};
use anyhow::{Context, Result};
use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

/// Interval of the settled-path sweep.
const SWEEP_INTERVAL: Duration = Duration::from_millis(500);

/// A filtered, classified filesystem event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchSignal {
    /// The path saw a create/modify event; restart its debounce timer.
    Touched(PathBuf),
    /// The path was closed for writing or moved in; it is ready now.
    Finished(PathBuf),
}

/// Classify a raw notify event into signals for recognized video files.
fn classify(event: &Event, extensions: &[String]) -> Vec<WatchSignal> {
    let finished = matches!(
        event.kind,
        EventKind::Access(AccessKind::Close(AccessMode::Write))
            | EventKind::Modify(ModifyKind::Name(RenameMode::To))
    );

    if !finished && !event.kind.is_create() && !event.kind.is_modify() {
        return Vec::new();
    }

    event
        .paths
        .iter()
        .filter(|path| is_supported(path, extensions))
        .map(|path| {
            if finished {
                WatchSignal::Finished(path.clone())
            } else {
                WatchSignal::Touched(path.clone())
            }
        })
        .collect()
}

/// File watcher that feeds the ingest queue.
pub struct FileWatcher {
    config: IntakeConfig,
    queue: IngestQueue,
    watcher: Option<RecommendedWatcher>,
}

impl FileWatcher {
    pub fn new(config: IntakeConfig, queue: IngestQueue) -> Self {
        Self {
            config,
            queue,
            watcher: None,
        }
    }

    /// Start watching the intake directory.
    ///
    /// The OS-level watch must survive for the process lifetime; if the
    /// notify backend dies, ingestion by drop stops until restart.
    pub async fn start(&mut self) -> Result<()> {
        let (event_tx, mut event_rx) = mpsc::channel::<WatchSignal>(100);
        let (settled_tx, mut settled_rx) = mpsc::channel::<PathBuf>(100);

        let mut tracker = DebounceTracker::new(
            Duration::from_secs(self.config.settle_secs),
            settled_tx,
        );

        let extensions = self.config.extensions.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    for signal in classify(&event, &extensions) {
                        let _ = event_tx.blocking_send(signal);
                    }
                }
            },
            Config::default(),
        )
        .context("Failed to create file watcher")?;

        watcher
            .watch(&self.config.dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch intake directory: {:?}", self.config.dir))?;
        tracing::info!("Watching intake directory: {:?}", self.config.dir);

        self.watcher = Some(watcher);

        let queue = self.queue.clone();
        tokio::spawn(async move {
            let mut sweep = tokio::time::interval(SWEEP_INTERVAL);

            loop {
                tokio::select! {
                    Some(signal) = event_rx.recv() => {
                        match signal {
                            WatchSignal::Touched(path) => {
                                tracing::debug!("File event: {:?}", path);
                                tracker.touch(path);
                            }
                            WatchSignal::Finished(path) => {
                                tracing::debug!("File closed/moved in: {:?}", path);
                                tracker.finish(path).await;
                            }
                        }
                    }

                    Some(path) = settled_rx.recv() => {
                        if path.is_file() {
                            if queue.enqueue(path.clone()) {
                                tracing::info!("Queued ingest for: {:?}", path);
                            }
                        }
                    }

                    _ = sweep.tick() => {
                        tracker.check_settled().await;
                    }
                }
            }
        });

        Ok(())
    }

    /// Stop watching.
    pub fn stop(&mut self) {
        self.watcher = None;
        tracing::info!("File watcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::CreateKind;

    fn exts() -> Vec<String> {
        vec!["mkv".to_string(), "mp4".to_string()]
    }

    fn event(kind: EventKind, path: &str) -> Event {
        Event {
            kind,
            paths: vec![PathBuf::from(path)],
            attrs: Default::default(),
        }
    }

    #[test]
    fn test_create_event_touches() {
        let e = event(EventKind::Create(CreateKind::File), "/in/a.mkv");
        assert_eq!(
            classify(&e, &exts()),
            vec![WatchSignal::Touched(PathBuf::from("/in/a.mkv"))]
        );
    }

    #[test]
    fn test_close_write_finishes() {
        let e = event(
            EventKind::Access(AccessKind::Close(AccessMode::Write)),
            "/in/a.mkv",
        );
        assert_eq!(
            classify(&e, &exts()),
            vec![WatchSignal::Finished(PathBuf::from("/in/a.mkv"))]
        );
    }

    #[test]
    fn test_rename_into_directory_finishes() {
        let e = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            "/in/a.mp4",
        );
        assert_eq!(
            classify(&e, &exts()),
            vec![WatchSignal::Finished(PathBuf::from("/in/a.mp4"))]
        );
    }

    #[test]
    fn test_unrecognized_extension_is_dropped() {
        let e = event(EventKind::Create(CreateKind::File), "/in/notes.txt");
        assert!(classify(&e, &exts()).is_empty());
    }

    #[test]
    fn test_other_access_events_are_dropped() {
        let e = event(
            EventKind::Access(AccessKind::Close(AccessMode::Read)),
            "/in/a.mkv",
        );
        assert!(classify(&e, &exts()).is_empty());
    }
}
