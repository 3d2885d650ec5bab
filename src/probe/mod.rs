//! FFprobe-based media probing.
//!
//! The pipeline only needs two facts about a source: its primary audio
//! codec (to choose rewrap vs. audio re-encode) and whether any subtitle
//! stream exists (to attempt caption extraction).

use crate::tools::{ToolError, ToolResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;

/// What the pipeline learns about a source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    /// Codec of the first audio stream, if any.
    pub audio_codec: Option<String>,
    /// Whether the source carries at least one subtitle stream.
    pub has_subtitles: bool,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
}

/// Probe a source file with ffprobe.
pub fn probe_source(path: &Path) -> ToolResult<ProbeReport> {
    let output = Command::new("ffprobe")
        .args(["-v", "quiet", "-print_format", "json", "-show_streams"])
        .arg(path)
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToolError::tool_not_found("ffprobe")
            } else {
                ToolError::Io(e)
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ToolError::tool_failed("ffprobe", stderr.to_string()));
    }

    let json_str = String::from_utf8(output.stdout)
        .map_err(|e| ToolError::parse_error("ffprobe", format!("Invalid UTF-8: {}", e)))?;

    let ff_output: FfprobeOutput = serde_json::from_str(&json_str)?;

    Ok(parse_streams(ff_output))
}

fn parse_streams(output: FfprobeOutput) -> ProbeReport {
    let audio_codec = output
        .streams
        .iter()
        .find(|s| s.codec_type == "audio")
        .and_then(|s| s.codec_name.clone());

    let has_subtitles = output.streams.iter().any(|s| s.codec_type == "subtitle");

    ProbeReport {
        audio_codec,
        has_subtitles,
    }
}
