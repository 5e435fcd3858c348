//! WebVTT subtitle generation.
//!
//! The device only renders WebVTT, so the selected subtitle stream (or an
//! external subtitle file) is converted with ffmpeg into a file at a fixed
//! location, shifted to match the playback start offset.

use std::path::{Path, PathBuf};

use castit_core::Result;
use tokio_util::sync::CancellationToken;

use crate::command::ToolCommand;
use crate::process::TranscodeProcessManager;

/// Where the subtitle track comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum SubtitleSource {
    /// A subtitle stream inside the media file, by relative index (`0:s:N`).
    Embedded { input: String, stream: usize },
    /// A standalone subtitle file (srt, ass, vtt...).
    External(PathBuf),
}

impl SubtitleSource {
    fn input(&self) -> String {
        match self {
            Self::Embedded { input, .. } => input.clone(),
            Self::External(path) => path.to_string_lossy().to_string(),
        }
    }
}

/// A single conversion job.
#[derive(Debug, Clone)]
pub struct SubtitleRequest {
    pub source: SubtitleSource,
    /// Playback start offset; cues before it are dropped and the rest are
    /// re-based to zero.
    pub seek_secs: f64,
    /// User-configured shift. Positive delays show cues later.
    pub delay_secs: f64,
    pub output: PathBuf,
}

/// Build the ffmpeg command converting `request` into WebVTT.
pub fn build_subtitle_command(ffmpeg: &ToolCommand, request: &SubtitleRequest) -> ToolCommand {
    let mut cmd = ffmpeg.clone();
    cmd.args(["-y", "-v", "quiet", "-nostdin"]);
    if request.delay_secs != 0.0 {
        cmd.args(["-itsoffset", &format!("{:.3}", request.delay_secs)]);
    }
    if request.seek_secs > 0.0 {
        cmd.args(["-ss", &format!("{:.3}", request.seek_secs)]);
    }
    cmd.args(["-i", &request.source.input()]);

    let map = match &request.source {
        SubtitleSource::Embedded { stream, .. } => format!("0:s:{stream}"),
        SubtitleSource::External(_) => "0:s:0".to_string(),
    };
    cmd.args(["-map", &map, "-c:s", "webvtt", "-f", "webvtt"]);
    cmd.arg(request.output.to_string_lossy());
    cmd
}

/// Convert the subtitles and return the path of the written file.
///
/// Runs in the preview slot of `manager`, so it never overlaps a preview
/// tile generation.
pub async fn generate_subtitles(
    manager: &TranscodeProcessManager,
    ffmpeg: &ToolCommand,
    request: &SubtitleRequest,
    cancel: &CancellationToken,
) -> Result<PathBuf> {
    if let Some(parent) = request.output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    remove_stale(&request.output).await;

    let cmd = build_subtitle_command(ffmpeg, request);
    manager.run_preview(&cmd, cancel).await?;

    tracing::debug!(output = %request.output.display(), "Subtitles generated");
    Ok(request.output.clone())
}

/// Delete a previously generated file so a failed run never serves stale cues.
pub async fn remove_stale(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Could not remove old subtitles"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ffmpeg() -> ToolCommand {
        ToolCommand::new(PathBuf::from("ffmpeg"))
    }

    #[test]
    fn embedded_stream_with_offsets() {
        let request = SubtitleRequest {
            source: SubtitleSource::Embedded {
                input: "/m/show.mkv".into(),
                stream: 2,
            },
            seek_secs: 120.0,
            delay_secs: -1.5,
            output: PathBuf::from("/tmp/out/subs.vtt"),
        };
        assert_eq!(
            build_subtitle_command(&ffmpeg(), &request).command_line(),
            "ffmpeg -y -v quiet -nostdin -itsoffset -1.500 -ss 120.000 -i /m/show.mkv \
             -map 0:s:2 -c:s webvtt -f webvtt /tmp/out/subs.vtt"
        );
    }

    #[test]
    fn external_file_from_start_has_no_offsets() {
        let request = SubtitleRequest {
            source: SubtitleSource::External(PathBuf::from("/m/show.en.srt")),
            seek_secs: 0.0,
            delay_secs: 0.0,
            output: PathBuf::from("/tmp/subs.vtt"),
        };
        let line = build_subtitle_command(&ffmpeg(), &request).command_line();
        assert!(!line.contains("-ss"));
        assert!(!line.contains("-itsoffset"));
        assert!(line.contains("-i /m/show.en.srt -map 0:s:0"));
    }

    #[tokio::test]
    async fn failed_conversion_leaves_no_stale_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("nested").join("subs.vtt");
        tokio::fs::create_dir_all(output.parent().unwrap()).await.unwrap();
        tokio::fs::write(&output, "WEBVTT\n\nstale").await.unwrap();

        let mut failing = ToolCommand::new(PathBuf::from("sh"));
        failing.args(["-c", "exit 1", "--"]);
        let request = SubtitleRequest {
            source: SubtitleSource::External(dir.path().join("missing.srt")),
            seek_secs: 0.0,
            delay_secs: 0.0,
            output: output.clone(),
        };

        let manager = TranscodeProcessManager::new();
        let result = generate_subtitles(&manager, &failing, &request, &CancellationToken::new()).await;
        assert!(result.is_err());
        assert!(!output.exists());
    }
}
