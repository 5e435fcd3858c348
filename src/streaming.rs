//! The device-facing byte stream for the file currently playing.
//!
//! The session publishes a [`TranscodeRequest`] when it loads a local or HLS
//! source; the `/media` route opens it here. Opening always supersedes the
//! previous transcode, so a seek (which republishes the plan at a new offset)
//! simply restarts ffmpeg when the device reconnects.

use std::sync::Arc;

use castit_av::transcode::build_transcode_command;
use castit_av::{ToolCommand, TranscodeProcessManager, TranscodeRequest, TranscodeStream};
use castit_core::{Error, Result};
use parking_lot::RwLock;

pub struct MediaStreamer {
    processes: Arc<TranscodeProcessManager>,
    ffmpeg: Option<ToolCommand>,
    probe_window_bytes: usize,
    plan: RwLock<Option<TranscodeRequest>>,
}

impl MediaStreamer {
    pub fn new(
        processes: Arc<TranscodeProcessManager>,
        ffmpeg: Option<ToolCommand>,
        probe_window_bytes: usize,
    ) -> Self {
        Self {
            processes,
            ffmpeg,
            probe_window_bytes,
            plan: RwLock::new(None),
        }
    }

    /// Whether ffmpeg was found; transcoded sources cannot play without it.
    pub fn is_available(&self) -> bool {
        self.ffmpeg.is_some()
    }

    pub fn set_plan(&self, request: TranscodeRequest) {
        tracing::debug!(
            input = %request.input,
            seek = request.seek_secs,
            video = request.decision.video,
            audio = request.decision.audio,
            hw = %request.decision.hw_accel,
            "Stream plan published"
        );
        *self.plan.write() = Some(request);
    }

    pub fn clear(&self) {
        self.plan.write().take();
    }

    pub fn plan(&self) -> Option<TranscodeRequest> {
        self.plan.read().clone()
    }

    /// Start the transcode for the current plan and return its output with
    /// the matching content type.
    pub async fn open(&self) -> Result<(TranscodeStream, &'static str)> {
        let request = self
            .plan()
            .ok_or_else(|| Error::NotReady("no media is loaded".into()))?;
        let ffmpeg = self
            .ffmpeg
            .as_ref()
            .ok_or_else(|| Error::tool("ffmpeg", "ffmpeg was not found on this machine"))?;

        let stream = self
            .processes
            .start_transcode_with_fallback(
                |hw| build_transcode_command(ffmpeg, &request.with_hw(hw)),
                request.decision.hw_accel,
                self.probe_window_bytes,
            )
            .await?;
        Ok((stream, request.content_type()))
    }
}
