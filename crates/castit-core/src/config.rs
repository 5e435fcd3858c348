//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries all
//! sub-configs for the streaming server, tools, playback, thumbnails and
//! paths. Every section defaults sensibly so a completely empty `{}` file is
//! valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::media::{HwAccelDeviceType, VideoQuality, VideoScaleType};
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub tools: ToolsConfig,
    pub playback: PlaybackConfig,
    pub thumbnails: ThumbnailConfig,
    pub paths: PathsConfig,
    #[serde(default = "default_save_interval")]
    pub save_interval_secs: u64,
}

fn default_save_interval() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            tools: ToolsConfig::default(),
            playback: PlaybackConfig::default(),
            thumbnails: ThumbnailConfig::default(),
            paths: PathsConfig::default(),
            save_interval_secs: default_save_interval(),
        }
    }
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; devices cannot reach a random port".into());
        }

        if self.server.host == "0.0.0.0" || self.server.host.is_empty() {
            warnings.push(
                "server.host should be an address the cast device can reach, not a wildcard"
                    .into(),
            );
        }

        if self.thumbnails.seconds_per_image == 0 {
            warnings.push("thumbnails.seconds_per_image is 0; previews are disabled".into());
        }

        if self.thumbnails.tiles_per_row == 0 || self.thumbnails.tiles_per_column == 0 {
            warnings.push("thumbnails tile grid must be at least 1x1".into());
        }

        if self.playback.enable_hardware_acceleration
            && self
                .playback
                .available_hw_accels
                .iter()
                .all(|hw| *hw == HwAccelDeviceType::None)
        {
            warnings.push(
                "playback.enable_hardware_acceleration is set but no accelerator is listed in available_hw_accels"
                    .into(),
            );
        }

        if self.playback.hw_probe_window_bytes == 0 {
            warnings.push(
                "playback.hw_probe_window_bytes is 0; hardware failures will only surface mid-stream"
                    .into(),
            );
        }

        warnings
    }

    /// Base URL the cast device uses to reach the streaming routes.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.server.host, self.server.port)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Streaming server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address advertised to the cast device.
    pub host: String,
    pub port: u16,
    /// Address the HTTP listener binds to.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 9696,
            bind: "0.0.0.0".into(),
        }
    }
}

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

/// Playback and transcode preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub enable_hardware_acceleration: bool,
    /// Accelerators present on this machine. Order does not matter.
    pub available_hw_accels: Vec<HwAccelDeviceType>,
    pub force_video_transcode: bool,
    pub force_audio_transcode: bool,
    pub video_scale: VideoScaleType,
    pub video_quality: VideoQuality,
    /// Shift applied to generated subtitles, in seconds.
    pub subtitle_delay_secs: f64,
    pub load_first_subtitle_found_automatically: bool,
    /// Ignore the stored elapsed time and always start at second 0.
    pub start_files_from_the_start: bool,
    pub play_next_file_automatically: bool,
    /// Bytes read from a hardware transcode before it is considered healthy.
    /// A heuristic: slow-starting encoders may be misclassified as failed.
    #[serde(default = "default_hw_probe_window")]
    pub hw_probe_window_bytes: usize,
}

fn default_hw_probe_window() -> usize {
    4096
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            enable_hardware_acceleration: true,
            available_hw_accels: Vec::new(),
            force_video_transcode: false,
            force_audio_transcode: false,
            video_scale: VideoScaleType::Original,
            video_quality: VideoQuality::Medium,
            subtitle_delay_secs: 0.0,
            load_first_subtitle_found_automatically: true,
            start_files_from_the_start: false,
            play_next_file_automatically: true,
            hw_probe_window_bytes: default_hw_probe_window(),
        }
    }
}

/// Preview tile settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Width of one range in seconds; one composite tile per range.
    pub seconds_per_image: u64,
    pub tiles_per_row: u32,
    pub tiles_per_column: u32,
    pub tile_width: u32,
    pub tile_height: u32,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            seconds_per_image: 60,
            tiles_per_row: 5,
            tiles_per_column: 5,
            tile_width: 200,
            tile_height: 150,
        }
    }
}

/// Filesystem locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Scratch directory for generated subtitles.
    pub output_dir: PathBuf,
    /// JSON file holding playlists between runs.
    pub library_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./data/output"),
            library_file: PathBuf::from("./data/library.json"),
        }
    }
}

impl PathsConfig {
    /// Fixed location of the WebVTT file served to the device.
    pub fn subtitle_file(&self) -> PathBuf {
        self.output_dir.join("subs.vtt")
    }
}
