//! Session values owned by the controller, and the snapshot handed out to
//! readers.

use std::path::PathBuf;

use castit_core::events::PlaybackState;
use castit_core::{DeviceId, EntryId, FileKind, PlaylistId, VideoQuality, VideoScaleType};
use serde::{Deserialize, Serialize};

/// Per-session stream selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileOptions {
    /// Relative audio stream index; `None` picks the first.
    pub audio_stream: Option<usize>,
    /// Relative subtitle stream index; `None` defers to the auto-load setting.
    pub subtitle_stream: Option<usize>,
    /// External subtitle file, which wins over embedded streams.
    pub external_subtitle: Option<PathBuf>,
    pub video_scale: Option<VideoScaleType>,
    pub quality: Option<VideoQuality>,
}

/// How a play request was issued.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayOptions {
    /// Reload even if the entry is already playing.
    pub force: bool,
    pub file_options_changed: bool,
    /// Issued by the session itself (end of media). Validation failures skip
    /// ahead instead of being returned.
    pub automatic: bool,
    /// Start offset; `None` resumes from the stored elapsed time.
    pub seek_secs: Option<f64>,
}

impl PlayOptions {
    pub fn user() -> Self {
        Self::default()
    }

    pub fn automatic() -> Self {
        Self {
            force: true,
            automatic: true,
            ..Self::default()
        }
    }

    pub fn at(mut self, seek_secs: f64) -> Self {
        self.seek_secs = Some(seek_secs);
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// The file loaded on the device.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CurrentMedia {
    pub playlist_id: PlaylistId,
    pub entry_id: EntryId,
    pub position: u32,
    pub kind: FileKind,
    pub title: String,
    pub duration_secs: Option<f64>,
    /// Where the served stream starts inside the file. Device-reported
    /// times of a transcoded stream are relative to this.
    pub seek_offset_secs: f64,
    pub elapsed_secs: f64,
    /// Served through our transcoder, so seeking restarts the stream.
    pub transcoded: bool,
}

impl CurrentMedia {
    pub fn absolute_secs(&self, reported_secs: f64) -> f64 {
        if self.transcoded {
            self.seek_offset_secs + reported_secs
        } else {
            reported_secs
        }
    }

    pub fn played_percentage(&self) -> f64 {
        match self.duration_secs {
            Some(d) if d > 0.0 => (self.elapsed_secs / d * 100.0).clamp(0.0, 100.0),
            _ => 0.0,
        }
    }
}

/// The single playback session. Only the controller task touches it.
#[derive(Debug, Clone)]
pub(crate) struct PlaybackSession {
    pub state: PlaybackState,
    pub current: Option<CurrentMedia>,
    pub device_id: Option<DeviceId>,
    pub volume: f64,
    pub muted: bool,
    pub file_options: FileOptions,
    /// Bumped after every navigation; stale skip requests are dropped.
    pub navigation: u64,
    /// Epoch of the live device connection. Disconnects from older epochs
    /// are ignored.
    pub connection: u64,
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self {
            state: PlaybackState::Idle,
            current: None,
            device_id: None,
            volume: 1.0,
            muted: false,
            file_options: FileOptions::default(),
            navigation: 0,
            connection: 0,
        }
    }
}

impl PlaybackSession {
    pub fn is_current(&self, entry_id: EntryId) -> bool {
        self.current.as_ref().is_some_and(|c| c.entry_id == entry_id)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let current = self.current.as_ref();
        SessionSnapshot {
            state: self.state,
            playlist_id: current.map(|c| c.playlist_id),
            entry_id: current.map(|c| c.entry_id),
            title: current.map(|c| c.title.clone()),
            device_id: self.device_id.clone(),
            elapsed_secs: current.map(|c| c.elapsed_secs).unwrap_or(0.0),
            duration_secs: current.and_then(|c| c.duration_secs),
            played_percentage: current.map(|c| c.played_percentage()).unwrap_or(0.0),
            volume: self.volume,
            muted: self.muted,
            file_options: self.file_options.clone(),
            navigation: self.navigation,
        }
    }
}

/// Immutable view of the session for readers outside the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: PlaybackState,
    pub playlist_id: Option<PlaylistId>,
    pub entry_id: Option<EntryId>,
    pub title: Option<String>,
    pub device_id: Option<DeviceId>,
    pub elapsed_secs: f64,
    pub duration_secs: Option<f64>,
    pub played_percentage: f64,
    pub volume: f64,
    pub muted: bool,
    pub file_options: FileOptions,
    pub navigation: u64,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        PlaybackSession::default().snapshot()
    }
}

/// Clamp a seek target into `[0, duration)`. Unknown or live durations only
/// clamp at zero.
pub fn clamp_seek(secs: f64, duration_secs: Option<f64>) -> f64 {
    let secs = if secs.is_finite() { secs.max(0.0) } else { 0.0 };
    match duration_secs {
        Some(d) if d.is_finite() && d > 0.0 => secs.min((d - 1.0).max(0.0)),
        _ => secs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seek_is_clamped_below_duration() {
        assert_eq!(clamp_seek(-5.0, Some(100.0)), 0.0);
        assert_eq!(clamp_seek(50.0, Some(100.0)), 50.0);
        assert_eq!(clamp_seek(100.0, Some(100.0)), 99.0);
        assert_eq!(clamp_seek(0.5, Some(0.5)), 0.0);
        assert_eq!(clamp_seek(5000.0, None), 5000.0);
        assert_eq!(clamp_seek(f64::NAN, Some(10.0)), 0.0);
    }

    #[test]
    fn transcoded_time_is_offset() {
        let mut media = CurrentMedia {
            playlist_id: PlaylistId::new(),
            entry_id: EntryId::new(),
            position: 1,
            kind: FileKind::LocalVideo,
            title: "a.mkv".into(),
            duration_secs: Some(200.0),
            seek_offset_secs: 120.0,
            elapsed_secs: 0.0,
            transcoded: true,
        };
        assert_eq!(media.absolute_secs(10.0), 130.0);
        media.elapsed_secs = 50.0;
        assert_eq!(media.played_percentage(), 25.0);

        media.transcoded = false;
        assert_eq!(media.absolute_secs(10.0), 10.0);
    }

    #[test]
    fn idle_snapshot() {
        let snapshot = SessionSnapshot::default();
        assert_eq!(snapshot.state, PlaybackState::Idle);
        assert!(snapshot.entry_id.is_none());
        assert_eq!(snapshot.volume, 1.0);
    }
}
