//! FFprobe-based [`MediaProber`] implementation.
//!
//! Shells out to `ffprobe -v quiet -print_format json -show_format -show_streams`
//! and maps the JSON output into [`StreamMetadata`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::types::{AudioStream, FormatInfo, StreamMetadata, SubtitleStream, VideoStream};
use super::MediaProber;
use crate::command::ToolCommand;
use crate::tools::{ToolRegistry, FFPROBE};

/// A prober backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
}

impl FfprobeProber {
    /// Create a new prober using the given ffprobe path.
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self { ffprobe_path }
    }

    /// Create a prober from a discovered registry.
    pub fn from_registry(tools: &ToolRegistry) -> castit_core::Result<Self> {
        Ok(Self::new(tools.require(FFPROBE)?.path.clone()))
    }

    /// The fixed argument template for a given source.
    pub fn command_for(&self, path: &str) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.args([
            "-v", "quiet",
            "-print_format", "json",
            "-show_format",
            "-show_streams",
        ]);
        cmd.arg(path);
        cmd
    }
}

fn is_remote(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[async_trait]
impl MediaProber for FfprobeProber {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    async fn probe(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> castit_core::Result<Option<StreamMetadata>> {
        // Avoid spinning up a process for paths that are already gone.
        if !is_remote(path) && !tokio::fs::try_exists(Path::new(path)).await.unwrap_or(false) {
            return Err(castit_core::Error::not_found("file", path));
        }

        let output = match self.command_for(path).execute_cancellable(cancel).await {
            Ok(output) => output,
            Err(castit_core::Error::Cancelled) => return Err(castit_core::Error::Cancelled),
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "ffprobe failed; metadata unavailable");
                return Ok(None);
            }
        };

        match parse_ffprobe_json(&output.stdout) {
            Ok(metadata) => Ok(Some(metadata)),
            Err(e) => {
                tracing::error!(path = %path, error = %e, "Could not parse ffprobe output");
                Ok(None)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    index: u32,
    codec_type: Option<String>,
    codec_name: Option<String>,
    profile: Option<String>,
    level: Option<i32>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    channels: Option<u32>,
    #[serde(default)]
    disposition: FfprobeDisposition,
    #[serde(default)]
    tags: FfprobeTags,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeDisposition {
    #[serde(default)]
    default: u8,
    #[serde(default)]
    attached_pic: u8,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeTags {
    language: Option<String>,
    title: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Parse raw ffprobe JSON into [`StreamMetadata`].
pub fn parse_ffprobe_json(raw: &[u8]) -> castit_core::Result<StreamMetadata> {
    let output: FfprobeOutput = serde_json::from_slice(raw)
        .map_err(|e| castit_core::Error::Probe(format!("ffprobe JSON parse error: {e}")))?;

    let format = output
        .format
        .map(|f| FormatInfo {
            format_name: f.format_name.unwrap_or_default(),
            duration_secs: f
                .duration
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|d| d.is_finite() && *d > 0.0),
            bit_rate: f.bit_rate.and_then(|s| s.parse().ok()),
        })
        .unwrap_or_default();

    let mut metadata = StreamMetadata {
        format,
        ..Default::default()
    };

    for stream in output.streams {
        let codec_name = stream.codec_name.unwrap_or_default().to_lowercase();
        match stream.codec_type.as_deref().unwrap_or("") {
            "video" => metadata.videos.push(VideoStream {
                index: stream.index,
                codec_name,
                profile: stream.profile,
                level: stream.level,
                width: stream.width.unwrap_or(0),
                height: stream.height.unwrap_or(0),
                avg_frame_rate: stream.avg_frame_rate.as_deref().and_then(parse_frame_rate),
                is_attached_picture: stream.disposition.attached_pic == 1,
            }),
            "audio" => metadata.audios.push(AudioStream {
                index: stream.index,
                codec_name,
                profile: stream.profile,
                channels: stream.channels.unwrap_or(2),
                language: stream.tags.language,
            }),
            "subtitle" => metadata.subtitles.push(SubtitleStream {
                index: stream.index,
                codec_name,
                language: stream.tags.language,
                title: stream.tags.title,
                is_default: stream.disposition.default == 1,
            }),
            _ => {}
        }
    }

    Ok(metadata)
}

fn parse_frame_rate(rate_str: &str) -> Option<f64> {
    if let Some((num, den)) = rate_str.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den != 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    rate_str.parse().ok().filter(|r: &f64| *r > 0.0)
}
