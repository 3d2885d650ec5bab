//! Per-file processing: stabilize, validate, probe, transcode, segment,
//! extract subtitles, publish, clean up.
//!
//! The progressive MP4 is the mandatory deliverable. HLS segments and the
//! caption track are best-effort: their failures are logged and the title is
//! published anyway. A failed primary transcode leaves the source file in the
//! intake directory for inspection and publishes nothing.

use crate::catalog::{HLS_DIR, SUBTITLE_EXT, VIDEO_EXT};
use crate::ingest::stability::{wait_for_stable, Stability};
use crate::transcode::{MediaTool, TranscodeMode};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Settings the pipeline needs beyond the media tool itself.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Root of the published-media tree.
    pub media_dir: PathBuf,
    /// Recognized source extensions; anything else is silently skipped.
    pub extensions: Vec<String>,
    /// Audio codec that needs no re-encode for browser playback.
    pub target_audio_codec: String,
    /// Interval for the size-stability poll.
    pub poll_interval: Duration,
}

/// How a single file's run through the pipeline ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The progressive container was produced and the title is ready.
    Published { title: String },
    /// The file disappeared before processing; not an error.
    SkippedVanished,
    /// Unrecognized extension; not an error.
    SkippedUnsupported,
}

/// Check whether a path carries one of the recognized video extensions.
pub fn is_supported(path: &Path, extensions: &[String]) -> bool {
    if let Some(ext) = path.extension() {
        let ext_str = ext.to_string_lossy().to_lowercase();
        return extensions.iter().any(|e| e.to_lowercase() == ext_str);
    }
    false
}

/// The per-file processing routine, synchronous by design: it runs on the
/// single ingest worker under `spawn_blocking`.
pub struct Pipeline {
    tool: Arc<dyn MediaTool>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(tool: Arc<dyn MediaTool>, settings: PipelineSettings) -> Self {
        Self { tool, settings }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run a source file through every stage.
    ///
    /// Returns `Err` only for fatal-for-this-file conditions (probe I/O
    /// trouble aside, that means a failed primary transcode); the caller
    /// logs it and moves on to the next queued path.
    pub fn process(&self, src: &Path) -> Result<Outcome> {
        // Stabilize
        match wait_for_stable(src, self.settings.poll_interval)
            .with_context(|| format!("Failed to stat source file: {:?}", src))?
        {
            Stability::Stable(size) => {
                debug!("Source stable at {} bytes: {:?}", size, src);
            }
            Stability::Vanished => {
                debug!("Source vanished before processing: {:?}", src);
                return Ok(Outcome::SkippedVanished);
            }
        }

        // Validate
        if !is_supported(src, &self.settings.extensions) {
            debug!("Ignoring unsupported extension: {:?}", src);
            return Ok(Outcome::SkippedUnsupported);
        }

        let title = match src.file_stem().and_then(|s| s.to_str()) {
            Some(stem) if !stem.is_empty() => stem.to_string(),
            _ => {
                debug!("Cannot derive a title from: {:?}", src);
                return Ok(Outcome::SkippedUnsupported);
            }
        };

        // Probe. A failed probe is not fatal: the codec is treated as
        // unknown and the audio re-encode path is taken.
        let report = match self.tool.probe(src) {
            Ok(report) => report,
            Err(e) => {
                warn!("Probe failed for {:?}, assuming unknown audio: {}", src, e);
                Default::default()
            }
        };

        let mode = if report.audio_codec.as_deref() == Some(self.settings.target_audio_codec.as_str())
        {
            TranscodeMode::Rewrap
        } else {
            TranscodeMode::ReencodeAudio
        };

        // Transcode or rewrap into a fresh title directory.
        let title_dir = self.settings.media_dir.join(&title);
        std::fs::create_dir_all(&title_dir)
            .with_context(|| format!("Failed to create title directory: {:?}", title_dir))?;

        let video_path = title_dir.join(format!("{}.{}", title, VIDEO_EXT));

        if let Err(e) = self.tool.transcode(src, &video_path, mode) {
            // No partial entry may remain in the published tree; the source
            // stays in the intake directory for inspection.
            let _ = std::fs::remove_dir_all(&title_dir);
            return Err(e).with_context(|| format!("Transcode failed for {:?}", src));
        }
        info!("Produced progressive container: {:?} ({:?})", video_path, mode);

        // Segment. Non-fatal: the progressive file stays servable.
        let hls_dir = title_dir.join(HLS_DIR);
        if let Err(e) = self.tool.segment(&video_path, &hls_dir) {
            warn!("HLS segmenting failed for {:?}: {}", video_path, e);
            let _ = std::fs::remove_dir_all(&hls_dir);
        }

        // Subtitles. Non-fatal: publish without a caption track.
        if report.has_subtitles {
            let subtitle_path = title_dir.join(format!("{}.{}", title, SUBTITLE_EXT));
            if let Err(e) = self.tool.extract_subtitle(src, &subtitle_path) {
                warn!("Subtitle extraction failed for {:?}: {}", src, e);
            }
        }

        // Publish & cleanup: the source leaves the intake directory only
        // once the progressive container exists.
        if let Err(e) = std::fs::remove_file(src) {
            warn!("Published {:?} but could not remove source {:?}: {}", title, src, e);
        }

        info!("Title published: {}", title);
        Ok(Outcome::Published { title })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_supported_case_insensitive() {
        let exts = vec!["mkv".to_string(), "mp4".to_string()];
        assert!(is_supported(Path::new("/in/movie.MKV"), &exts));
        assert!(is_supported(Path::new("/in/movie.mp4"), &exts));
        assert!(!is_supported(Path::new("/in/notes.txt"), &exts));
        assert!(!is_supported(Path::new("/in/noext"), &exts));
    }
}
