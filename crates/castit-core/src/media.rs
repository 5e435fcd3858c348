//! Media-domain enums for hardware accelerators, scaling, quality, and
//! source classification.
//!
//! All enums serialize in lowercase (via `serde(rename_all = "lowercase")`) and
//! implement `Display` manually for consistent string representation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

// ---------------------------------------------------------------------------
// HwAccelDeviceType
// ---------------------------------------------------------------------------

/// Vendor-specific encode/decode offload path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HwAccelDeviceType {
    None,
    Intel,
    Nvidia,
    Amd,
}

impl HwAccelDeviceType {
    /// Selection priority when several accelerators are available.
    /// Higher wins.
    pub fn priority(self) -> u8 {
        match self {
            Self::Nvidia => 3,
            Self::Amd => 2,
            Self::Intel => 1,
            Self::None => 0,
        }
    }

    pub fn is_hardware(self) -> bool {
        self != Self::None
    }
}

impl Default for HwAccelDeviceType {
    fn default() -> Self {
        Self::None
    }
}

impl fmt::Display for HwAccelDeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Intel => write!(f, "intel"),
            Self::Nvidia => write!(f, "nvidia"),
            Self::Amd => write!(f, "amd"),
        }
    }
}

// ---------------------------------------------------------------------------
// VideoScaleType
// ---------------------------------------------------------------------------

/// Requested output height. The discriminant is the height in pixels and is
/// embedded verbatim in scale filters; `Original` keeps the source size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoScaleType {
    Original = 0,
    Hd = 720,
    FullHd = 1080,
}

impl VideoScaleType {
    /// Target height in pixels (`0` for `Original`).
    pub fn height(self) -> i32 {
        self as i32
    }
}

impl Default for VideoScaleType {
    fn default() -> Self {
        Self::Original
    }
}

impl fmt::Display for VideoScaleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Original => write!(f, "original"),
            Self::Hd => write!(f, "hd"),
            Self::FullHd => write!(f, "fullhd"),
        }
    }
}

// ---------------------------------------------------------------------------
// VideoQuality
// ---------------------------------------------------------------------------

/// Encoder quality preset used when video has to be re-encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoQuality {
    Low,
    Medium,
    High,
}

impl VideoQuality {
    /// Constant-quality value (CRF for software, global quality for QSV,
    /// CQ for NVENC/AMF). Lower is better.
    pub fn quality_value(self) -> u32 {
        match self {
            Self::Low => 28,
            Self::Medium => 23,
            Self::High => 18,
        }
    }
}

impl Default for VideoQuality {
    fn default() -> Self {
        Self::Medium
    }
}

impl fmt::Display for VideoQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

// ---------------------------------------------------------------------------
// FileKind
// ---------------------------------------------------------------------------

const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "m4v", "webm", "wmv", "flv", "mpg", "mpeg", "ts", "m2ts",
];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "aac", "m4a", "flac", "wav", "ogg", "opus", "wma"];

/// Classification of a playlist entry's path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    LocalVideo,
    LocalAudio,
    Url,
    Hls,
}

impl FileKind {
    /// Classify a local path or URL. Returns `None` when no handler
    /// recognizes it.
    pub fn classify(path: &str) -> Option<Self> {
        let lower = path.to_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            let without_query = lower.split(['?', '#']).next().unwrap_or(&lower);
            if without_query.ends_with(".m3u8") {
                return Some(Self::Hls);
            }
            return Some(Self::Url);
        }

        let ext = Path::new(&lower)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::LocalVideo)
        } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::LocalAudio)
        } else if ext == "m3u8" {
            Some(Self::Hls)
        } else {
            None
        }
    }

    pub fn is_local(self) -> bool {
        matches!(self, Self::LocalVideo | Self::LocalAudio)
    }

    pub fn is_remote(self) -> bool {
        !self.is_local()
    }

    /// Whether the device (or our transcoder) can seek inside the source and
    /// generate per-range preview tiles for it.
    pub fn is_seekable_for_previews(self) -> bool {
        self == Self::LocalVideo
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalVideo => write!(f, "localvideo"),
            Self::LocalAudio => write!(f, "localaudio"),
            Self::Url => write!(f, "url"),
            Self::Hls => write!(f, "hls"),
        }
    }
}
