//! Transcode planning: what to re-encode, with which accelerator, and the
//! resulting ffmpeg invocation.

use castit_core::{FileKind, HwAccelDeviceType, VideoQuality, VideoScaleType};
use serde::{Deserialize, Serialize};

use crate::probe::StreamMetadata;

pub mod args;
pub mod decision;

pub use args::{build_transcode_command, output_content_type, scale_filter, ScaleFilter};
pub use decision::{needs_audio_transcode, needs_video_transcode, select_hw_accelerator};

/// Per-playback choices derived from metadata and user settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeDecision {
    pub video: bool,
    pub audio: bool,
    /// Accelerator used for decode/encode; only meaningful when `video`.
    pub hw_accel: HwAccelDeviceType,
}

/// Inputs for [`TranscodeDecision::decide`].
#[derive(Debug, Clone, Copy)]
pub struct DecisionInputs<'a> {
    pub force_video: bool,
    pub force_audio: bool,
    pub scale: VideoScaleType,
    pub video_stream: Option<usize>,
    pub audio_stream: Option<usize>,
    pub enable_hw: bool,
    pub available_hw: &'a [HwAccelDeviceType],
}

impl TranscodeDecision {
    pub fn decide(metadata: &StreamMetadata, inputs: DecisionInputs<'_>) -> Self {
        let video = needs_video_transcode(
            metadata,
            inputs.force_video,
            inputs.scale,
            inputs.video_stream,
        );
        let audio = needs_audio_transcode(metadata, inputs.force_audio, inputs.audio_stream);
        let hw_accel = if video {
            select_hw_accelerator(
                metadata,
                inputs.available_hw,
                inputs.enable_hw,
                inputs.video_stream,
            )
        } else {
            HwAccelDeviceType::None
        };

        Self {
            video,
            audio,
            hw_accel,
        }
    }
}

/// Everything needed to build the device-facing ffmpeg command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodeRequest {
    /// Local path or URL handed to `-i`.
    pub input: String,
    pub kind: FileKind,
    pub seek_secs: f64,
    /// Relative stream selections (`0:v:N`, `0:a:N`).
    pub video_stream: Option<usize>,
    pub audio_stream: Option<usize>,
    pub has_video: bool,
    pub has_audio: bool,
    /// Codec of the selected audio stream, used to pick the audio-only muxer.
    pub audio_codec: Option<String>,
    /// Source width and height of the selected video stream.
    pub source_size: Option<(u32, u32)>,
    pub video_scale: VideoScaleType,
    pub quality: VideoQuality,
    pub decision: TranscodeDecision,
}

impl TranscodeRequest {
    /// Build a request from probed metadata.
    pub fn from_metadata(
        input: impl Into<String>,
        kind: FileKind,
        metadata: &StreamMetadata,
        inputs: DecisionInputs<'_>,
        quality: VideoQuality,
        seek_secs: f64,
    ) -> Self {
        let video = metadata.video(inputs.video_stream);
        let audio = metadata.audio(inputs.audio_stream);
        Self {
            input: input.into(),
            kind,
            seek_secs: seek_secs.max(0.0),
            video_stream: inputs.video_stream,
            audio_stream: inputs.audio_stream,
            has_video: video.is_some(),
            has_audio: audio.is_some(),
            audio_codec: audio.map(|a| a.codec_name.clone()),
            source_size: video.map(|v| (v.width, v.height)),
            video_scale: inputs.scale,
            quality,
            decision: TranscodeDecision::decide(metadata, inputs),
        }
    }

    /// The same request with a different accelerator, used for the
    /// software retry after a hardware failure.
    pub fn with_hw(&self, hw_accel: HwAccelDeviceType) -> Self {
        let mut next = self.clone();
        next.decision.hw_accel = hw_accel;
        next
    }

    pub fn content_type(&self) -> &'static str {
        output_content_type(self)
    }
}
