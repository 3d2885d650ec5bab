//! Deduplicating serial ingest queue.
//!
//! `enqueue` is safe to call from any task (the watcher, the HTTP layer, the
//! startup re-scan). A path already pending or running is a no-op; once its
//! job has fully completed the path may be enqueued again. A single worker
//! task pulls paths in FIFO order and runs the pipeline for one file at a
//! time, so at most one transcode executes system-wide.

pub mod pipeline;
pub mod stability;

pub use pipeline::{is_supported, Outcome, Pipeline, PipelineSettings};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// One path's membership in the queue.
#[derive(Debug, Clone, Serialize)]
pub struct IngestJob {
    pub path: PathBuf,
    pub enqueued_at: DateTime<Utc>,
}

struct QueueInner {
    /// Paths pending or running. Check-and-insert is atomic under this lock.
    pending: Mutex<HashSet<PathBuf>>,
    tx: mpsc::UnboundedSender<IngestJob>,
}

/// Handle to the ingest queue. Cheap to clone; all clones share the worker.
#[derive(Clone)]
pub struct IngestQueue {
    inner: Arc<QueueInner>,
}

impl IngestQueue {
    /// Create the queue and spawn its single worker task.
    ///
    /// The worker runs each job's pipeline under `spawn_blocking` (it polls
    /// for stability and waits on subprocesses) and only removes the path
    /// from the pending set after the job has fully completed.
    pub fn start(pipeline: Arc<Pipeline>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<IngestJob>();
        let inner = Arc::new(QueueInner {
            pending: Mutex::new(HashSet::new()),
            tx,
        });

        let worker_inner = Arc::clone(&inner);
        tokio::spawn(async move {
            info!("Ingest worker started");

            while let Some(job) = rx.recv().await {
                let path = job.path.clone();
                debug!("Ingest job started: {:?} (enqueued {})", path, job.enqueued_at);

                let task_pipeline = Arc::clone(&pipeline);
                let task_path = path.clone();
                let result =
                    tokio::task::spawn_blocking(move || task_pipeline.process(&task_path)).await;

                match result {
                    Ok(Ok(Outcome::Published { title })) => {
                        info!("Ingest complete for {:?}: published '{}'", path, title);
                    }
                    Ok(Ok(Outcome::SkippedVanished)) => {
                        debug!("Ingest skipped, file vanished: {:?}", path);
                    }
                    Ok(Ok(Outcome::SkippedUnsupported)) => {
                        debug!("Ingest skipped, unsupported file: {:?}", path);
                    }
                    Ok(Err(e)) => {
                        // Errors never propagate past the worker loop; the
                        // queue stays live for the next path.
                        error!("Ingest failed for {:?}: {:#}", path, e);
                    }
                    Err(e) => {
                        error!("Ingest task panicked for {:?}: {}", path, e);
                    }
                }

                worker_inner.pending.lock().remove(&path);
            }

            info!("Ingest worker stopped");
        });

        Self { inner }
    }

    /// Enqueue a path unless it is already pending or running.
    ///
    /// Returns `true` if the path was accepted.
    pub fn enqueue(&self, path: PathBuf) -> bool {
        let mut pending = self.inner.pending.lock();
        if !pending.insert(path.clone()) {
            debug!("Path already queued, ignoring: {:?}", path);
            return false;
        }

        let job = IngestJob {
            path: path.clone(),
            enqueued_at: Utc::now(),
        };

        if self.inner.tx.send(job).is_err() {
            // Worker is gone; don't leave the path stuck in the set.
            pending.remove(&path);
            return false;
        }

        true
    }

    /// Whether a path is currently pending or running.
    pub fn is_pending(&self, path: &Path) -> bool {
        self.inner.pending.lock().contains(path)
    }

    /// Number of paths pending or running.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Snapshot of pending/running paths, for status reporting.
    pub fn pending(&self) -> Vec<PathBuf> {
        self.inner.pending.lock().iter().cloned().collect()
    }
}
