use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub intake: IntakeConfig,

    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub transcode: TranscodeConfig,

    #[serde(default)]
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Intake directory settings: where dropped files land and how the
/// watcher decides they have finished being written.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IntakeConfig {
    #[serde(default = "default_intake_dir")]
    pub dir: PathBuf,

    /// How long a file must be quiet before the watcher considers it settled.
    #[serde(default = "default_settle_time")]
    pub settle_secs: u64,

    /// Interval for the worker-side size-stability poll.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Recognized video container extensions.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_intake_dir() -> PathBuf {
    PathBuf::from("./intake")
}
fn default_settle_time() -> u64 {
    2
}
fn default_poll_interval() -> u64 {
    2
}
fn default_extensions() -> Vec<String> {
    ["mkv", "mp4", "avi", "mov", "m4v", "webm", "ts"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            dir: default_intake_dir(),
            settle_secs: default_settle_time(),
            poll_interval_secs: default_poll_interval(),
            extensions: default_extensions(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaConfig {
    /// Root of the published-media tree (one subdirectory per title).
    #[serde(default = "default_media_dir")]
    pub dir: PathBuf,
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("./media")
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            dir: default_media_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscodeConfig {
    /// Browser-target audio codec. Sources already using it are rewrapped
    /// without re-encoding.
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    #[serde(default = "default_audio_sample_rate")]
    pub audio_sample_rate: u32,

    #[serde(default = "default_audio_channels")]
    pub audio_channels: u32,

    /// Target HLS segment duration in seconds.
    #[serde(default = "default_hls_segment_secs")]
    pub hls_segment_secs: u32,
}

fn default_audio_codec() -> String {
    "aac".to_string()
}
fn default_audio_bitrate() -> String {
    "128k".to_string()
}
fn default_audio_sample_rate() -> u32 {
    44100
}
fn default_audio_channels() -> u32 {
    2
}
fn default_hls_segment_secs() -> u32 {
    6
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            audio_codec: default_audio_codec(),
            audio_bitrate: default_audio_bitrate(),
            audio_sample_rate: default_audio_sample_rate(),
            audio_channels: default_audio_channels(),
            hls_segment_secs: default_hls_segment_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    /// Timeout for remote-URL downloads, in seconds.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
}

fn default_download_timeout() -> u64 {
    300
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            download_timeout_secs: default_download_timeout(),
        }
    }
}
