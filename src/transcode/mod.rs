//! The narrow seam between the ingest pipeline and the external media tool.
//!
//! The pipeline's state machine only ever talks to a [`MediaTool`], so it can
//! be exercised in tests with a fake that returns canned results. The real
//! implementation shells out to ffmpeg/ffprobe.

mod ffmpeg;

pub use ffmpeg::FfmpegTool;

use crate::config::TranscodeConfig;
use crate::probe::ProbeReport;
use crate::tools::ToolResult;
use std::path::Path;

/// How the progressive container is produced from a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeMode {
    /// Source audio already matches the target codec: stream-copy everything
    /// into the new container, no re-encode.
    Rewrap,
    /// Copy the video stream unmodified and re-encode only the audio.
    ReencodeAudio,
}

/// Settings for the ffmpeg command lines.
#[derive(Debug, Clone)]
pub struct TranscodeSettings {
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub audio_sample_rate: u32,
    pub audio_channels: u32,
    pub hls_segment_secs: u32,
}

impl From<&TranscodeConfig> for TranscodeSettings {
    fn from(config: &TranscodeConfig) -> Self {
        Self {
            audio_codec: config.audio_codec.clone(),
            audio_bitrate: config.audio_bitrate.clone(),
            audio_sample_rate: config.audio_sample_rate,
            audio_channels: config.audio_channels,
            hls_segment_secs: config.hls_segment_secs,
        }
    }
}

impl Default for TranscodeSettings {
    fn default() -> Self {
        Self::from(&TranscodeConfig::default())
    }
}

/// Media tool operations the pipeline depends on.
pub trait MediaTool: Send + Sync {
    /// Inspect a source file: primary audio codec and subtitle presence.
    fn probe(&self, src: &Path) -> ToolResult<ProbeReport>;

    /// Produce a browser-playable progressive container at `dst`.
    fn transcode(&self, src: &Path, dst: &Path, mode: TranscodeMode) -> ToolResult<()>;

    /// Segment a progressive container into an HLS playlist under `hls_dir`.
    fn segment(&self, src: &Path, hls_dir: &Path) -> ToolResult<()>;

    /// Extract the first subtitle stream of `src` to a WebVTT file at `dst`.
    fn extract_subtitle(&self, src: &Path, dst: &Path) -> ToolResult<()>;
}
