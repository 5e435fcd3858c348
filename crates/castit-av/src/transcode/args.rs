//! ffmpeg argument building for the device-facing stream.

use castit_core::{FileKind, HwAccelDeviceType, VideoScaleType};

use super::TranscodeRequest;
use crate::command::ToolCommand;

/// Audio re-encode target: AAC, 128 kbps, stereo.
pub const AUDIO_TRANSCODE_ARGS: &[&str] = &["-c:a", "aac", "-b:a", "128k", "-ac", "2"];

/// Scale stage selected for a video re-encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScaleFilter {
    /// Intel Quick Sync `scale_qsv` filter graph (`-vf`).
    Qsv(String),
    /// NVIDIA cuvid decoder resize (input-side `-resize WxH`).
    CuvidResize { width: u32, height: u32 },
    /// Generic software `scale` filter graph (`-vf`).
    Software(String),
}

impl ScaleFilter {
    /// Name of the filter (or decoder option) doing the scaling.
    pub fn graph_name(&self) -> &'static str {
        match self {
            Self::Qsv(_) => "scale_qsv",
            Self::CuvidResize { .. } => "resize",
            Self::Software(_) => "scale",
        }
    }

    /// The textual filter graph or option value.
    pub fn value(&self) -> String {
        match self {
            Self::Qsv(graph) | Self::Software(graph) => graph.clone(),
            Self::CuvidResize { width, height } => format!("{width}x{height}"),
        }
    }
}

/// Software scale graph keeping the aspect ratio with even dimensions.
pub fn software_scale_graph(height: i32) -> String {
    format!("scale=trunc(oh*a/2)*2:{height}")
}

fn even(value: f64) -> u32 {
    let rounded = value.round() as u32;
    rounded - rounded % 2
}

/// Select the accelerator-specific scale stage for a requested output size.
///
/// Returns `None` when no scaling is needed: `Original` was requested, or the
/// NVIDIA decoder already produces the requested height.
pub fn scale_filter(
    hw: HwAccelDeviceType,
    scale: VideoScaleType,
    source: Option<(u32, u32)>,
) -> Option<ScaleFilter> {
    if scale == VideoScaleType::Original {
        return None;
    }
    let height = scale.height();

    match hw {
        HwAccelDeviceType::Intel => Some(ScaleFilter::Qsv(format!(
            "scale_qsv=w=-1:h={height}:mode=hq"
        ))),
        HwAccelDeviceType::Nvidia => match source {
            Some((src_w, src_h)) if src_h > 0 => {
                if src_h as i32 == height {
                    return None;
                }
                let width = even(src_w as f64 * height as f64 / src_h as f64);
                Some(ScaleFilter::CuvidResize {
                    width,
                    height: height as u32,
                })
            }
            // Unknown source size: the decoder cannot be told a width.
            _ => Some(ScaleFilter::Software(software_scale_graph(height))),
        },
        HwAccelDeviceType::Amd | HwAccelDeviceType::None => {
            Some(ScaleFilter::Software(software_scale_graph(height)))
        }
    }
}

/// Decoder-side arguments placed before `-i`.
fn hw_input_args(hw: HwAccelDeviceType, scale: Option<&ScaleFilter>) -> Vec<String> {
    let mut args: Vec<String> = match hw {
        HwAccelDeviceType::Intel => vec!["-hwaccel", "qsv", "-c:v", "h264_qsv"],
        HwAccelDeviceType::Nvidia => vec!["-hwaccel", "cuda", "-c:v", "h264_cuvid"],
        HwAccelDeviceType::Amd => vec!["-hwaccel", "auto"],
        HwAccelDeviceType::None => vec![],
    }
    .into_iter()
    .map(String::from)
    .collect();

    if let Some(ScaleFilter::CuvidResize { .. }) = scale {
        args.push("-resize".into());
        args.push(scale.map(ScaleFilter::value).unwrap_or_default());
    }
    args
}

/// Encoder arguments for a re-encoded video stream.
fn video_encoder_args(hw: HwAccelDeviceType, quality: u32) -> Vec<String> {
    let q = quality.to_string();
    let args: Vec<&str> = match hw {
        HwAccelDeviceType::Intel => vec![
            "-c:v", "h264_qsv", "-preset", "veryfast", "-look_ahead", "1",
            "-global_quality", &q,
        ],
        HwAccelDeviceType::Nvidia => vec!["-c:v", "h264_nvenc", "-preset", "p4", "-cq", &q],
        HwAccelDeviceType::Amd => vec![
            "-c:v", "h264_amf", "-quality", "speed", "-rc", "cqp", "-qp_i", &q, "-qp_p", &q,
        ],
        HwAccelDeviceType::None => vec![
            "-c:v", "libx264", "-preset", "veryfast", "-crf", &q, "-profile:v", "high",
            "-level", "4.1", "-pix_fmt", "yuv420p",
        ],
    };
    args.into_iter().map(String::from).collect()
}

/// Build the full ffmpeg invocation streaming `request` to stdout.
///
/// When neither stream needs re-encoding this is a container copy: both
/// codecs are `copy` and metadata/chapters are stripped, since the device
/// rejects chapter atoms.
pub fn build_transcode_command(ffmpeg: &ToolCommand, request: &TranscodeRequest) -> ToolCommand {
    let mut cmd = ffmpeg.clone();
    let decision = &request.decision;
    let hw = if decision.video {
        decision.hw_accel
    } else {
        HwAccelDeviceType::None
    };
    let scale = if decision.video {
        scale_filter(hw, request.video_scale, request.source_size)
    } else {
        None
    };

    cmd.args(["-v", "quiet", "-nostdin"]);
    cmd.args(hw_input_args(hw, scale.as_ref()));

    if request.seek_secs > 0.0 {
        cmd.args(["-ss", &format!("{:.3}", request.seek_secs)]);
    }
    cmd.args(["-i", &request.input]);

    if request.has_video {
        let v = request.video_stream.unwrap_or(0);
        cmd.args(["-map", &format!("0:v:{v}")]);
    }
    if request.has_audio {
        let a = request.audio_stream.unwrap_or(0);
        cmd.args(["-map", &format!("0:a:{a}?")]);
    }

    if request.has_video {
        if decision.video {
            cmd.args(video_encoder_args(hw, request.quality.quality_value()));
            match &scale {
                Some(filter @ (ScaleFilter::Qsv(_) | ScaleFilter::Software(_))) => {
                    cmd.args(["-vf", &filter.value()]);
                }
                _ => {}
            }
        } else {
            cmd.args(["-c:v", "copy"]);
        }
    }

    if request.has_audio {
        if decision.audio {
            cmd.args(AUDIO_TRANSCODE_ARGS.iter().copied());
        } else {
            cmd.args(["-c:a", "copy"]);
        }
    }

    cmd.args(["-map_metadata", "-1", "-map_chapters", "-1"]);

    if request.has_video {
        cmd.args(["-movflags", "frag_keyframe+empty_moov+default_base_moof", "-f", "mp4"]);
    } else {
        let copied_mp3 = !decision.audio
            && request.audio_codec.as_deref().is_some_and(|c| c == "mp3");
        cmd.args(["-f", if copied_mp3 { "mp3" } else { "adts" }]);
    }

    cmd.arg("pipe:1");
    cmd
}

/// MIME type of the stream produced by [`build_transcode_command`].
pub fn output_content_type(request: &TranscodeRequest) -> &'static str {
    if request.has_video {
        "video/mp4"
    } else if !request.decision.audio && request.audio_codec.as_deref() == Some("mp3") {
        "audio/mpeg"
    } else if request.kind == FileKind::Hls {
        "video/mp4"
    } else {
        "audio/aac"
    }
}
