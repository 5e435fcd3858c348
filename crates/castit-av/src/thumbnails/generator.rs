//! ffmpeg-backed [`TileGenerator`].

use std::sync::Arc;

use async_trait::async_trait;
use castit_core::config::ThumbnailConfig;
use castit_core::{Error, HwAccelDeviceType, Result};
use tokio_util::sync::CancellationToken;

use super::{PreviewSource, ThumbnailRange, TileGenerator};
use crate::command::ToolCommand;
use crate::process::TranscodeProcessManager;

/// Frame rate assumed when the probe did not report one.
const FALLBACK_FRAME_RATE: f64 = 24.0;

/// Renders filmstrip tiles through the preview slot of a
/// [`TranscodeProcessManager`], falling back to software when a hardware
/// run fails.
pub struct FfmpegTileGenerator {
    ffmpeg: ToolCommand,
    processes: Arc<TranscodeProcessManager>,
    config: ThumbnailConfig,
}

impl FfmpegTileGenerator {
    pub fn new(ffmpeg: ToolCommand, processes: Arc<TranscodeProcessManager>, config: ThumbnailConfig) -> Self {
        Self {
            ffmpeg,
            processes,
            config,
        }
    }

    /// Sampling rate so one range fills the grid: source fps divided by the
    /// range width.
    pub fn sample_fps(source: &PreviewSource, window_secs: i64) -> f64 {
        let rate = source
            .frame_rate
            .filter(|r| r.is_finite() && *r > 0.0)
            .unwrap_or(FALLBACK_FRAME_RATE);
        rate / window_secs.max(1) as f64
    }

    /// ffmpeg invocation rendering `range` as a single mjpeg grid on stdout.
    pub fn tile_command(
        &self,
        source: &PreviewSource,
        range: &ThumbnailRange,
        window_secs: i64,
        hw: HwAccelDeviceType,
    ) -> ToolCommand {
        let c = &self.config;
        let (w, h) = (c.tile_width, c.tile_height);
        let grid = format!("tile={}x{}", c.tiles_per_row, c.tiles_per_column);
        let fps = format!("fps={:.6}", Self::sample_fps(source, window_secs));

        let (input_args, filters): (Vec<&str>, String) = match hw {
            HwAccelDeviceType::Intel => (
                vec!["-hwaccel", "qsv", "-hwaccel_output_format", "qsv", "-c:v", "h264_qsv"],
                format!("scale_qsv=w={w}:h={h},hwdownload,format=nv12,{fps},{grid}"),
            ),
            HwAccelDeviceType::Nvidia => (
                vec!["-hwaccel", "cuda", "-hwaccel_output_format", "cuda", "-c:v", "h264_cuvid"],
                format!("scale_cuda={w}:{h},hwdownload,format=nv12,{fps},{grid}"),
            ),
            HwAccelDeviceType::Amd => (
                vec!["-hwaccel", "auto"],
                format!("{fps},scale={w}:{h},{grid}"),
            ),
            HwAccelDeviceType::None => (vec![], format!("{fps},scale={w}:{h},{grid}")),
        };

        let mut cmd = self.ffmpeg.clone();
        cmd.args(["-v", "quiet", "-nostdin"]);
        cmd.args(input_args);
        cmd.args(["-ss", &range.minimum.to_string()]);
        cmd.args(["-t", &range.span_secs().to_string()]);
        cmd.args(["-i", &source.path]);
        cmd.args(["-map", "0:v:0", "-an", "-sn", "-vf", &filters]);
        cmd.args(["-frames:v", "1", "-f", "image2pipe", "-c:v", "mjpeg", "pipe:1"]);
        cmd
    }

    /// ffmpeg invocation extracting one still of a non-seekable source.
    pub fn static_command(&self, source: &PreviewSource) -> ToolCommand {
        let input = source.static_image.as_deref().unwrap_or(&source.path);
        let scale = format!("scale={}:{}", self.config.tile_width, self.config.tile_height);

        let mut cmd = self.ffmpeg.clone();
        cmd.args(["-v", "quiet", "-nostdin", "-i", input]);
        cmd.args(["-map", "0:v:0", "-an", "-vf", &scale]);
        cmd.args(["-frames:v", "1", "-f", "image2pipe", "-c:v", "mjpeg", "pipe:1"]);
        cmd
    }
}

fn non_empty(tool: &ToolCommand, bytes: Vec<u8>) -> Result<Vec<u8>> {
    if bytes.is_empty() {
        return Err(Error::process(
            tool.program_name(),
            format!("`{}` produced no image", tool.command_line()),
        ));
    }
    Ok(bytes)
}

#[async_trait]
impl TileGenerator for FfmpegTileGenerator {
    async fn generate(
        &self,
        source: &PreviewSource,
        range: &ThumbnailRange,
        window_secs: i64,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let output = self
            .processes
            .run_preview_with_fallback(
                |hw| self.tile_command(source, range, window_secs, hw),
                source.hw_accel,
                cancel,
            )
            .await?;
        non_empty(&self.ffmpeg, output.stdout)
    }

    async fn static_preview(&self, source: &PreviewSource, cancel: &CancellationToken) -> Result<Vec<u8>> {
        let output = self
            .processes
            .run_preview(&self.static_command(source), cancel)
            .await?;
        non_empty(&self.ffmpeg, output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use castit_core::FileKind;
    use std::path::PathBuf;

    fn source(hw: HwAccelDeviceType) -> PreviewSource {
        PreviewSource {
            path: "/m/movie.mkv".into(),
            kind: FileKind::LocalVideo,
            duration_secs: Some(130.0),
            frame_rate: Some(24.0),
            is_audio_only: false,
            static_image: None,
            hw_accel: hw,
        }
    }

    fn generator(ffmpeg: ToolCommand) -> FfmpegTileGenerator {
        FfmpegTileGenerator::new(
            ffmpeg,
            Arc::new(TranscodeProcessManager::new()),
            ThumbnailConfig::default(),
        )
    }

    fn range() -> ThumbnailRange {
        ThumbnailRange {
            index: 2,
            minimum: 120,
            maximum: 130,
            tile: None,
        }
    }

    #[test]
    fn fps_is_frame_rate_over_window() {
        assert!((FfmpegTileGenerator::sample_fps(&source(HwAccelDeviceType::None), 60) - 0.4).abs() < 1e-9);
        let mut unknown = source(HwAccelDeviceType::None);
        unknown.frame_rate = None;
        assert!((FfmpegTileGenerator::sample_fps(&unknown, 60) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn software_tile_command() {
        let gen = generator(ToolCommand::new(PathBuf::from("ffmpeg")));
        let line = gen
            .tile_command(&source(HwAccelDeviceType::None), &range(), 60, HwAccelDeviceType::None)
            .command_line();
        assert_eq!(
            line,
            "ffmpeg -v quiet -nostdin -ss 120 -t 11 -i /m/movie.mkv -map 0:v:0 -an -sn \
             -vf fps=0.400000,scale=200:150,tile=5x5 -frames:v 1 -f image2pipe -c:v mjpeg pipe:1"
        );
    }

    #[test]
    fn hardware_tile_commands_use_device_filters() {
        let gen = generator(ToolCommand::new(PathBuf::from("ffmpeg")));
        let src = source(HwAccelDeviceType::Intel);
        let intel = gen.tile_command(&src, &range(), 60, HwAccelDeviceType::Intel).command_line();
        assert!(intel.contains("-hwaccel qsv"));
        assert!(intel.contains("scale_qsv=w=200:h=150"));

        let nvidia = gen.tile_command(&src, &range(), 60, HwAccelDeviceType::Nvidia).command_line();
        assert!(nvidia.contains("-hwaccel cuda"));
        assert!(nvidia.contains("scale_cuda=200:150"));
    }

    #[test]
    fn static_command_prefers_preview_image() {
        let gen = generator(ToolCommand::new(PathBuf::from("ffmpeg")));
        let mut src = source(HwAccelDeviceType::None);
        src.kind = FileKind::Url;
        src.path = "https://example.com/video".into();
        src.static_image = Some("https://example.com/thumb.jpg".into());
        assert!(gen
            .static_command(&src)
            .command_line()
            .contains("-i https://example.com/thumb.jpg"));
    }

    #[tokio::test]
    async fn empty_output_is_an_error() {
        let mut ffmpeg = ToolCommand::new(PathBuf::from("sh"));
        ffmpeg.args(["-c", "true", "--"]);
        let gen = generator(ffmpeg);
        let result = gen
            .generate(&source(HwAccelDeviceType::None), &range(), 60, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(Error::ProcessFailure { .. })));
    }

    #[tokio::test]
    async fn hardware_failure_reruns_in_software() {
        // Exits non-zero whenever a hardware decoder is requested.
        let mut ffmpeg = ToolCommand::new(PathBuf::from("sh"));
        ffmpeg.args([
            "-c",
            r#"case "$*" in *-hwaccel*) exit 1;; *) printf jpeg;; esac"#,
            "--",
        ]);
        let gen = generator(ffmpeg);
        let tile = gen
            .generate(&source(HwAccelDeviceType::Nvidia), &range(), 60, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(tile, b"jpeg");
    }
}
