//! FFmpeg-backed [`MediaTool`] implementation.

use super::{MediaTool, TranscodeMode, TranscodeSettings};
use crate::probe::{self, ProbeReport};
use crate::tools::{ToolError, ToolResult};
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Invokes ffmpeg/ffprobe as subprocesses.
///
/// No timeout is enforced on invocations; a hung ffmpeg stalls the single
/// ingest worker until it exits.
pub struct FfmpegTool {
    settings: TranscodeSettings,
}

impl FfmpegTool {
    pub fn new(settings: TranscodeSettings) -> Self {
        Self { settings }
    }

    fn run_ffmpeg(&self, args: &[String]) -> ToolResult<()> {
        debug!("FFmpeg args: {:?}", args);

        let output = Command::new("ffmpeg").args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToolError::tool_not_found("ffmpeg")
            } else {
                ToolError::Io(e)
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ToolError::tool_failed("ffmpeg", stderr.to_string()));
        }

        Ok(())
    }
}

/// Build the argument list for producing the progressive container.
///
/// Both modes place the container index before the media data (`faststart`)
/// so playback can begin before the whole file downloads.
pub fn transcode_args(
    settings: &TranscodeSettings,
    src: &Path,
    dst: &Path,
    mode: TranscodeMode,
) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        src.to_string_lossy().to_string(),
    ];

    match mode {
        TranscodeMode::Rewrap => {
            args.extend(["-c".to_string(), "copy".to_string()]);
        }
        TranscodeMode::ReencodeAudio => {
            args.extend([
                "-c:v".to_string(),
                "copy".to_string(),
                "-c:a".to_string(),
                settings.audio_codec.clone(),
                "-ac".to_string(),
                settings.audio_channels.to_string(),
                "-b:a".to_string(),
                settings.audio_bitrate.clone(),
                "-ar".to_string(),
                settings.audio_sample_rate.to_string(),
            ]);
        }
    }

    args.extend([
        "-movflags".to_string(),
        "+faststart".to_string(),
        dst.to_string_lossy().to_string(),
    ]);

    args
}

/// Build the argument list for HLS segmenting (stream copy, VOD playlist).
pub fn segment_args(settings: &TranscodeSettings, src: &Path, hls_dir: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        src.to_string_lossy().to_string(),
        "-c".to_string(),
        "copy".to_string(),
        "-hls_time".to_string(),
        settings.hls_segment_secs.to_string(),
        "-hls_playlist_type".to_string(),
        "vod".to_string(),
        "-hls_segment_filename".to_string(),
        hls_dir.join("segment_%03d.ts").to_string_lossy().to_string(),
        hls_dir.join("index.m3u8").to_string_lossy().to_string(),
    ]
}

/// Build the argument list for extracting the first subtitle stream.
pub fn subtitle_args(src: &Path, dst: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        src.to_string_lossy().to_string(),
        "-map".to_string(),
        "0:s:0".to_string(),
        "-c:s".to_string(),
        "webvtt".to_string(),
        dst.to_string_lossy().to_string(),
    ]
}

impl MediaTool for FfmpegTool {
    fn probe(&self, src: &Path) -> ToolResult<ProbeReport> {
        probe::probe_source(src)
    }

    fn transcode(&self, src: &Path, dst: &Path, mode: TranscodeMode) -> ToolResult<()> {
        self.run_ffmpeg(&transcode_args(&self.settings, src, dst, mode))
    }

    fn segment(&self, src: &Path, hls_dir: &Path) -> ToolResult<()> {
        std::fs::create_dir_all(hls_dir)?;
        self.run_ffmpeg(&segment_args(&self.settings, src, hls_dir))
    }

    fn extract_subtitle(&self, src: &Path, dst: &Path) -> ToolResult<()> {
        self.run_ffmpeg(&subtitle_args(src, dst))
    }
}
