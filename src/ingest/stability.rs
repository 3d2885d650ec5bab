//! Worker-side file stability detection.
//!
//! The watcher's debounce already delays enqueueing until a file has been
//! quiet, but a slow copy can still be mid-write when the job starts. Before
//! touching a file the worker polls its size until two consecutive reads
//! agree.

use std::io;
use std::path::Path;
use std::time::Duration;

/// Result of waiting for a file to stop growing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    /// Size was unchanged across a full polling interval.
    Stable(u64),
    /// The file disappeared mid-poll (removed by an external actor).
    Vanished,
}

/// Block until `path` has a stable size, polling at `poll_interval`.
///
/// Runs on the single ingest worker, so blocking the thread is acceptable;
/// transcoding the same file will block it far longer.
pub fn wait_for_stable(path: &Path, poll_interval: Duration) -> io::Result<Stability> {
    let mut last_size = match file_size(path)? {
        Some(size) => size,
        None => return Ok(Stability::Vanished),
    };

    loop {
        std::thread::sleep(poll_interval);

        let size = match file_size(path)? {
            Some(size) => size,
            None => return Ok(Stability::Vanished),
        };

        if size == last_size {
            return Ok(Stability::Stable(size));
        }
        last_size = size;
    }
}

fn file_size(path: &Path) -> io::Result<Option<u64>> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(Some(meta.len())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
