//! Stream metadata extracted by probing.

use serde::{Deserialize, Serialize};

/// Container-level information.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormatInfo {
    /// Comma separated demuxer names as reported by the prober (e.g. "mov,mp4,m4a").
    pub format_name: String,
    /// Total duration in seconds, if known. Live sources report none.
    pub duration_secs: Option<f64>,
    pub bit_rate: Option<u64>,
}

/// A video stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoStream {
    /// Absolute stream index in the container.
    pub index: u32,
    pub codec_name: String,
    pub profile: Option<String>,
    pub level: Option<i32>,
    pub width: u32,
    pub height: u32,
    /// Average frame rate in frames per second.
    pub avg_frame_rate: Option<f64>,
    /// Attached pictures (cover art) are exposed as video streams.
    pub is_attached_picture: bool,
}

/// An audio stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioStream {
    pub index: u32,
    pub codec_name: String,
    pub profile: Option<String>,
    pub channels: u32,
    pub language: Option<String>,
}

/// A subtitle stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleStream {
    pub index: u32,
    pub codec_name: String,
    pub language: Option<String>,
    pub title: Option<String>,
    pub is_default: bool,
}

impl SubtitleStream {
    /// Bitmap subtitles cannot be converted to WebVTT.
    pub fn is_text_based(&self) -> bool {
        !matches!(
            self.codec_name.as_str(),
            "hdmv_pgs_subtitle" | "dvd_subtitle" | "dvb_subtitle" | "xsub"
        )
    }
}

/// Everything the orchestrator needs to decide how to play a source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamMetadata {
    pub format: FormatInfo,
    pub videos: Vec<VideoStream>,
    pub audios: Vec<AudioStream>,
    pub subtitles: Vec<SubtitleStream>,
}

impl StreamMetadata {
    pub fn duration_secs(&self) -> Option<f64> {
        self.format.duration_secs
    }

    /// The first real video stream, skipping attached cover art.
    pub fn primary_video(&self) -> Option<&VideoStream> {
        self.videos.iter().find(|v| !v.is_attached_picture)
    }

    /// Video stream by position among real video streams (`0:v:N`).
    pub fn video(&self, relative_index: Option<usize>) -> Option<&VideoStream> {
        match relative_index {
            Some(i) => self.videos.iter().filter(|v| !v.is_attached_picture).nth(i),
            None => self.primary_video(),
        }
    }

    /// Audio stream by position (`0:a:N`); defaults to the first one.
    pub fn audio(&self, relative_index: Option<usize>) -> Option<&AudioStream> {
        self.audios.get(relative_index.unwrap_or(0))
    }

    pub fn is_audio_only(&self) -> bool {
        self.primary_video().is_none() && !self.audios.is_empty()
    }

    /// Live and HLS sources have no fixed duration and cannot be decoded
    /// with hardware acceleration safely.
    pub fn is_live(&self) -> bool {
        self.format.format_name.split(',').any(|f| f == "hls") || self.format.duration_secs.is_none()
    }

    /// The first text subtitle stream, if any.
    pub fn first_text_subtitle(&self) -> Option<(usize, &SubtitleStream)> {
        self.subtitles
            .iter()
            .enumerate()
            .find(|(_, s)| s.is_text_based())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(index: u32, attached: bool) -> VideoStream {
        VideoStream {
            index,
            codec_name: "h264".into(),
            profile: Some("High".into()),
            level: Some(40),
            width: 1920,
            height: 1080,
            avg_frame_rate: Some(24.0),
            is_attached_picture: attached,
        }
    }

    #[test]
    fn primary_video_skips_cover_art() {
        let meta = StreamMetadata {
            videos: vec![video(0, true), video(1, false)],
            ..Default::default()
        };
        assert_eq!(meta.primary_video().unwrap().index, 1);
        assert_eq!(meta.video(Some(0)).unwrap().index, 1);
    }

    #[test]
    fn audio_only_with_cover_art() {
        let meta = StreamMetadata {
            format: FormatInfo {
                format_name: "mp3".into(),
                duration_secs: Some(200.0),
                bit_rate: None,
            },
            videos: vec![video(1, true)],
            audios: vec![AudioStream {
                index: 0,
                codec_name: "mp3".into(),
                profile: None,
                channels: 2,
                language: None,
            }],
            subtitles: vec![],
        };
        assert!(meta.is_audio_only());
        assert!(!meta.is_live());
    }

    #[test]
    fn live_detection() {
        let mut meta = StreamMetadata::default();
        meta.format.format_name = "hls".into();
        meta.format.duration_secs = Some(10.0);
        assert!(meta.is_live());

        meta.format.format_name = "matroska,webm".into();
        assert!(!meta.is_live());

        meta.format.duration_secs = None;
        assert!(meta.is_live());
    }

    #[test]
    fn bitmap_subtitles_are_skipped() {
        let meta = StreamMetadata {
            subtitles: vec![
                SubtitleStream {
                    index: 2,
                    codec_name: "hdmv_pgs_subtitle".into(),
                    language: Some("eng".into()),
                    title: None,
                    is_default: true,
                },
                SubtitleStream {
                    index: 3,
                    codec_name: "subrip".into(),
                    language: Some("spa".into()),
                    title: None,
                    is_default: false,
                },
            ],
            ..Default::default()
        };
        let (pos, sub) = meta.first_text_subtitle().unwrap();
        assert_eq!(pos, 1);
        assert_eq!(sub.index, 3);
    }
}
