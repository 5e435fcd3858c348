//! Pass-through vs transcode rules and hardware accelerator selection.
//!
//! Pure decision logic: no I/O, everything is derived from probed
//! [`StreamMetadata`] and caller flags.

use castit_core::{HwAccelDeviceType, VideoScaleType};

use crate::probe::StreamMetadata;

/// Video codecs the device decodes natively.
pub const ALLOWED_VIDEO_CODECS: &[&str] = &["h264"];
/// H.264 profiles the device decodes natively (compared case-insensitively).
pub const ALLOWED_VIDEO_PROFILES: &[&str] = &["main", "high"];
/// Highest H.264 level the device decodes natively.
pub const MAX_VIDEO_LEVEL: i32 = 41;

pub const ALLOWED_AUDIO_CODECS: &[&str] = &["mp3", "aac"];
/// Audio profiles that pass through (compared case-insensitively).
pub const ALLOWED_AUDIO_PROFILES: &[&str] = &["he-aac", "lc-aac", "lc", "he"];

fn contains_ci(list: &[&str], value: &str) -> bool {
    list.iter().any(|allowed| allowed.eq_ignore_ascii_case(value))
}

/// Whether the video codec itself is one the device (and our hardware
/// decoders) understand.
pub fn is_allowed_video_codec(metadata: &StreamMetadata, video_stream: Option<usize>) -> bool {
    metadata
        .video(video_stream)
        .is_some_and(|v| contains_ci(ALLOWED_VIDEO_CODECS, &v.codec_name))
}

/// Video passes through only for h264 Main/High at level <= 41, when no
/// transcode is forced and the original scale is requested. Sources without
/// a video stream never need a video transcode.
pub fn needs_video_transcode(
    metadata: &StreamMetadata,
    force: bool,
    desired_scale: VideoScaleType,
    video_stream: Option<usize>,
) -> bool {
    let Some(video) = metadata.video(video_stream) else {
        return false;
    };

    let codec_ok = contains_ci(ALLOWED_VIDEO_CODECS, &video.codec_name);
    let profile_ok = video
        .profile
        .as_deref()
        .is_some_and(|p| contains_ci(ALLOWED_VIDEO_PROFILES, p));
    let level_ok = video.level.is_some_and(|l| l <= MAX_VIDEO_LEVEL);

    !codec_ok || !profile_ok || !level_ok || force || desired_scale != VideoScaleType::Original
}

/// Audio passes through only for mp3/aac with an allowed profile when no
/// transcode is forced. Otherwise it is re-encoded to AAC 128k stereo.
pub fn needs_audio_transcode(
    metadata: &StreamMetadata,
    force: bool,
    audio_stream: Option<usize>,
) -> bool {
    let Some(audio) = metadata.audio(audio_stream) else {
        return false;
    };

    let codec_ok = contains_ci(ALLOWED_AUDIO_CODECS, &audio.codec_name);
    let profile_ok = audio
        .profile
        .as_deref()
        .is_some_and(|p| contains_ci(ALLOWED_AUDIO_PROFILES, p));

    !codec_ok || !profile_ok || force
}

/// Pick the accelerator to use: Nvidia > AMD > Intel > None, independent of
/// the order of `available`.
///
/// Downgrades to `None` when acceleration is disabled, the source is
/// live/HLS, or the source codec is outside the allow-list.
pub fn select_hw_accelerator(
    metadata: &StreamMetadata,
    available: &[HwAccelDeviceType],
    should_use: bool,
    video_stream: Option<usize>,
) -> HwAccelDeviceType {
    if !should_use || metadata.is_live() || !is_allowed_video_codec(metadata, video_stream) {
        return HwAccelDeviceType::None;
    }

    available
        .iter()
        .copied()
        .max_by_key(|hw| hw.priority())
        .unwrap_or(HwAccelDeviceType::None)
}
