//! The playback session actor.
//!
//! One task owns the [`PlaybackSession`] and is the only producer of
//! notifications. Commands from [`SessionHandle`]s, events from the device
//! and results from worker tasks arrive on separate channels and are handled
//! strictly one at a time, so transitions and their notifications keep the
//! order they happened in.
//!
//! Anything that waits on a process or the network runs on a spawned worker
//! that posts its result back. Loads carry a sequence number; results of a
//! load that was superseded or stopped are dropped.

use std::sync::Arc;

use castit_av::subtitles::{generate_subtitles, remove_stale, SubtitleRequest, SubtitleSource};
use castit_av::transcode::{select_hw_accelerator, DecisionInputs};
use castit_av::{
    MediaProber, PreviewSource, StreamMetadata, ThumbnailCache, ToolCommand, TranscodeProcessManager,
    TranscodeRequest,
};
use castit_core::config::Config;
use castit_core::events::{EventBus, EventPayload, PlaybackState};
use castit_core::{DeviceId, EntryId, Error, FileKind, HwAccelDeviceType, PlaylistId, Result};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::handle::{Command, Reply, SessionHandle};
use super::state::{clamp_seek, CurrentMedia, FileOptions, PlayOptions, PlaybackSession, SessionSnapshot};
use crate::connectivity::Connectivity;
use crate::device::{DeviceDescriptor, DeviceRegistry, MediaLoadRequest, MediaStatus, Player, PlayerEvent};
use crate::playlist::{CurrentRef, Library, NavigationDirection, NavigationOutcome, NavigationResolver, PlaylistEntry};
use crate::resolver::UrlResolver;
use crate::streaming::MediaStreamer;

const INBOX_CAPACITY: usize = 64;

/// Collaborators the session drives.
pub struct SessionDeps {
    pub config: Arc<Config>,
    pub library: Arc<RwLock<Library>>,
    pub devices: Arc<DeviceRegistry>,
    pub player: Arc<dyn Player>,
    pub prober: Arc<dyn MediaProber>,
    pub resolver: Arc<dyn UrlResolver>,
    pub connectivity: Arc<dyn Connectivity>,
    pub processes: Arc<TranscodeProcessManager>,
    pub thumbnails: Arc<ThumbnailCache>,
    pub streamer: Arc<MediaStreamer>,
    pub events: Arc<EventBus>,
    /// Used for subtitle conversion; `None` when ffmpeg is not installed.
    pub ffmpeg: Option<ToolCommand>,
}

/// Start the session actor. It runs until `shutdown` fires or every handle
/// is dropped, and stops playback on the way out.
pub fn spawn_session(deps: SessionDeps, shutdown: CancellationToken) -> (SessionHandle, JoinHandle<()>) {
    let (inbox_tx, inbox_rx) = mpsc::channel(INBOX_CAPACITY);
    let (worker_tx, worker_rx) = mpsc::channel(INBOX_CAPACITY);
    let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());
    let cancel = Arc::new(Mutex::new(shutdown.child_token()));
    // Subscribe before spawning so no device event is missed.
    let player_events = deps.player.subscribe();

    let controller = SessionController {
        deps: Arc::new(deps),
        session: PlaybackSession::default(),
        navigator: NavigationResolver::new(),
        pending: None,
        load_seq: 0,
        worker_tx,
        cancel: cancel.clone(),
        shutdown: shutdown.clone(),
        snapshot_tx,
    };
    let task = tokio::spawn(controller.run(inbox_rx, worker_rx, player_events));
    (SessionHandle::new(inbox_tx, snapshot_rx, cancel), task)
}

/// Media resolved for one load attempt.
struct ResolvedSource {
    url: String,
    title: String,
    metadata: StreamMetadata,
    preview_image: Option<String>,
    /// The metadata was just probed or resolved and belongs in the library.
    fresh_metadata: bool,
}

/// An entry that passed validation.
struct LoadTarget {
    playlist_id: PlaylistId,
    entry: PlaylistEntry,
    kind: FileKind,
    device: DeviceDescriptor,
}

/// Where the outcome of a load goes.
enum Responder {
    Silent,
    Play(Reply<()>),
    Navigate(Reply<bool>),
}

impl Responder {
    fn send(self, result: Result<()>) {
        match self {
            Self::Silent => {}
            Self::Play(reply) => {
                let _ = reply.send(result);
            }
            Self::Navigate(reply) => {
                let _ = reply.send(result.map(|()| true));
            }
        }
    }
}

/// Carried across every attempt of one play request.
struct LoadContext {
    responder: Responder,
    /// Entries an automatic request has skipped so far.
    attempts: usize,
    /// State to fall back to when a navigation's load is rejected.
    restore: Option<PlaybackState>,
}

impl LoadContext {
    fn new(responder: Responder) -> Self {
        Self {
            responder,
            attempts: 0,
            restore: None,
        }
    }
}

/// What the device was asked to play, kept until it answers.
struct StreamPlan {
    source: ResolvedSource,
    seek: f64,
    transcoded: bool,
    duration: Option<f64>,
}

/// A subtitle conversion to run before the device load.
struct SubtitleJob {
    ffmpeg: ToolCommand,
    request: SubtitleRequest,
    url: String,
}

/// A load waiting on a worker.
struct PendingLoad {
    seq: u64,
    target: LoadTarget,
    options: PlayOptions,
    context: LoadContext,
    cancel: CancellationToken,
    /// Held while the device connection is opened.
    source: Option<ResolvedSource>,
    /// Held while the device loads the stream.
    stream: Option<StreamPlan>,
}

enum ConnectPurpose {
    Load(u64),
    Request(Reply<()>),
}

/// Results posted back by worker tasks.
enum WorkerEvent {
    Resolved {
        seq: u64,
        result: Result<ResolvedSource>,
    },
    Connected {
        purpose: ConnectPurpose,
        device: DeviceDescriptor,
        previous: PlaybackState,
        result: Result<u64>,
    },
    Loaded {
        seq: u64,
        result: Result<MediaStatus>,
    },
    Refreshed {
        playlist_id: PlaylistId,
        entry_id: EntryId,
        exists: bool,
        result: Result<Option<StreamMetadata>>,
        reply: Reply<()>,
    },
}

struct SessionController {
    deps: Arc<SessionDeps>,
    session: PlaybackSession,
    navigator: NavigationResolver,
    pending: Option<PendingLoad>,
    load_seq: u64,
    worker_tx: mpsc::Sender<WorkerEvent>,
    /// Shared with the handles so a stop can abort in-flight work before
    /// its command is dequeued.
    cancel: Arc<Mutex<CancellationToken>>,
    shutdown: CancellationToken,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl SessionController {
    async fn run(
        mut self,
        mut inbox: mpsc::Receiver<Command>,
        mut workers: mpsc::Receiver<WorkerEvent>,
        mut player_events: broadcast::Receiver<PlayerEvent>,
    ) {
        tracing::info!("Session controller started");
        let shutdown = self.shutdown.clone();
        let mut player_open = true;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                command = inbox.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(event) = workers.recv() => self.handle_worker_event(event).await,
                event = player_events.recv(), if player_open => match event {
                    Ok(event) => self.handle_player_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Session fell behind on device events");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::warn!("Device event stream closed");
                        player_open = false;
                    }
                },
            }
            self.publish();
        }

        if let Err(e) = self.stop(true).await {
            tracing::warn!(error = %e, "Failed to stop playback on shutdown");
        }
        self.close_connection().await;
        self.publish();
        tracing::info!("Session controller stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Play {
                entry_id,
                options,
                reply,
            } => {
                self.play(entry_id, options, LoadContext::new(Responder::Play(reply)))
                    .await;
            }
            Command::Pause { reply } => {
                let _ = reply.send(self.pause().await);
            }
            Command::Resume { reply } => {
                let _ = reply.send(self.resume().await);
            }
            Command::Seek { secs, reply } => self.seek(secs, Responder::Play(reply)).await,
            Command::GoToPosition { percentage, reply } => {
                self.go_to_position(percentage, Responder::Play(reply)).await;
            }
            Command::AddSeconds { delta, reply } => self.add_seconds(delta, Responder::Play(reply)).await,
            Command::Stop { preserve_loop, reply } => {
                let _ = reply.send(self.stop(preserve_loop).await);
            }
            Command::Navigate {
                direction,
                generation,
                reply,
            } => {
                if generation != self.session.navigation {
                    tracing::debug!(?direction, "Dropping stale navigation request");
                    let _ = reply.send(Ok(false));
                } else {
                    self.navigate(direction, false, Responder::Navigate(reply)).await;
                }
            }
            Command::SetVolume { level, muted, reply } => {
                let _ = reply.send(self.set_volume(level, muted).await);
            }
            Command::Connect { device_id, reply } => self.connect(device_id, reply).await,
            Command::SetFileOptions { options, reply } => {
                self.set_file_options(options, Responder::Play(reply)).await;
            }
            Command::RefreshEntry { entry_id, reply } => self.refresh_entry(entry_id, reply),
            Command::AddPlaylist { name, reply } => {
                let playlist_id = self.deps.library.write().add_playlist(name);
                self.emit(EventPayload::PlaylistUpdated { playlist_id });
                let _ = reply.send(Ok(playlist_id));
            }
            Command::RemovePlaylist { playlist_id, reply } => {
                let _ = reply.send(self.remove_playlist(playlist_id));
            }
            Command::AddEntries {
                playlist_id,
                paths,
                reply,
            } => {
                let _ = reply.send(self.add_entries(playlist_id, paths));
            }
            Command::RemoveEntries {
                playlist_id,
                entry_ids,
                reply,
            } => {
                let _ = reply.send(self.remove_entries(playlist_id, &entry_ids));
            }
            Command::MoveEntry {
                playlist_id,
                entry_id,
                position,
                reply,
            } => {
                let _ = reply.send(self.move_entry(playlist_id, entry_id, position));
            }
            Command::SetPlaylistFlags {
                playlist_id,
                shuffle,
                looping,
                reply,
            } => {
                let _ = reply.send(self.set_playlist_flags(playlist_id, shuffle, looping));
            }
            Command::SetEntryLoop {
                entry_id,
                looping,
                reply,
            } => {
                let _ = reply.send(self.set_entry_loop(entry_id, looping));
            }
            Command::StreamFailed { error } => self.on_stream_failed(error).await,
        }
    }

    async fn handle_worker_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Resolved { seq, result } => self.on_resolved(seq, result).await,
            WorkerEvent::Connected {
                purpose,
                device,
                previous,
                result,
            } => self.on_connected(purpose, device, previous, result).await,
            WorkerEvent::Loaded { seq, result } => self.on_loaded(seq, result).await,
            WorkerEvent::Refreshed {
                playlist_id,
                entry_id,
                exists,
                result,
                reply,
            } => {
                let _ = reply.send(self.apply_refresh(playlist_id, entry_id, exists, result));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Play
    // -----------------------------------------------------------------------

    /// Validate `entry_id` and hand it to a load worker.
    ///
    /// Automatic requests never surface validation errors: unplayable
    /// entries are skipped in playlist order, at most once each, and
    /// playback stops when nothing is left.
    async fn play(&mut self, mut entry_id: EntryId, options: PlayOptions, mut context: LoadContext) {
        loop {
            let error = match self.validate(entry_id, options).await {
                Ok(target) => {
                    self.begin_load(target, options, context);
                    return;
                }
                Err(e) => e,
            };
            match self.recover(entry_id, options, error, context).await {
                Some((next, rest)) => {
                    entry_id = next;
                    context = rest;
                }
                None => return,
            }
        }
    }

    /// Checks that run on the actor. A rejected request changes nothing.
    async fn validate(&self, entry_id: EntryId, options: PlayOptions) -> Result<LoadTarget> {
        if self.session.state == PlaybackState::Connecting {
            return Err(Error::Connecting("a device connection is in progress".into()));
        }
        let (playlist_id, entry) = self.lookup(entry_id)?;
        let kind = entry
            .kind
            .or_else(|| FileKind::classify(&entry.path))
            .ok_or_else(|| Error::Unsupported(entry.path.clone()))?;

        if self.session.is_current(entry_id)
            && self.session.state.has_media()
            && !options.force
            && !options.file_options_changed
            && !entry.looping
        {
            return Err(Error::AlreadyPlaying(entry.name.clone()));
        }

        if kind.is_local() && !tokio::fs::try_exists(&entry.path).await.unwrap_or(false) {
            self.mark_missing(playlist_id, entry_id);
            return Err(Error::not_found("file", &entry.path));
        }

        let device = self.deps.devices.preferred().ok_or(Error::NoDevice)?;
        Ok(LoadTarget {
            playlist_id,
            entry,
            kind,
            device,
        })
    }

    /// Supersede any in-flight load and start resolving `target`.
    fn begin_load(&mut self, target: LoadTarget, options: PlayOptions, context: LoadContext) {
        self.abandon_load(Error::Cancelled);
        self.load_seq += 1;
        let seq = self.load_seq;
        let cancel = self.cancel.lock().child_token();
        tracing::debug!(seq, entry_id = %target.entry.id, "Resolving entry");

        let deps = self.deps.clone();
        let events = self.worker_tx.clone();
        let entry = target.entry.clone();
        let kind = target.kind;
        let token = cancel.clone();
        tokio::spawn(async move {
            let result = resolve_source(&deps, &entry, kind, &token).await;
            let _ = events.send(WorkerEvent::Resolved { seq, result }).await;
        });

        self.pending = Some(PendingLoad {
            seq,
            target,
            options,
            context,
            cancel,
            source: None,
            stream: None,
        });
    }

    /// Route a failed attempt. Returns the next entry to try when an
    /// automatic request skips ahead.
    async fn recover(
        &mut self,
        entry_id: EntryId,
        options: PlayOptions,
        error: Error,
        mut context: LoadContext,
    ) -> Option<(EntryId, LoadContext)> {
        if !options.automatic {
            if error.is_validation() || matches!(error, Error::Cancelled) {
                if let Some(previous) = context.restore {
                    if self.session.state == PlaybackState::Navigating {
                        self.set_state(previous);
                    }
                }
                context.responder.send(Err(error));
            } else {
                // Device and process failures are reported as notifications.
                self.fail(Some(entry_id), error).await;
                context.responder.send(Ok(()));
            }
            return None;
        }

        match error {
            Error::Cancelled => {
                context.responder.send(Ok(()));
                return None;
            }
            e if !e.is_validation() => {
                self.fail(Some(entry_id), e).await;
                context.responder.send(Ok(()));
                return None;
            }
            e => tracing::warn!(entry_id = %entry_id, error = %e, "Skipping unplayable entry"),
        }

        context.attempts += 1;
        let next = if context.attempts < self.playlist_len_of(entry_id) {
            self.skip_target(entry_id)
        } else {
            None
        };
        match next {
            Some(id) => Some((id, context)),
            None => {
                tracing::info!("No playable entry left; stopping");
                if let Err(e) = self.stop(false).await {
                    tracing::warn!(error = %e, "Failed to stop after skipping");
                }
                context.responder.send(Ok(()));
                None
            }
        }
    }

    /// Finish a load: answer its caller or move on to recovery.
    async fn settle(&mut self, pending: PendingLoad, result: Result<()>) {
        let PendingLoad {
            target,
            options,
            context,
            ..
        } = pending;
        let error = match result {
            Ok(()) => {
                context.responder.send(Ok(()));
                return;
            }
            Err(e) => e,
        };
        if let Some((next, context)) = self.recover(target.entry.id, options, error, context).await {
            self.play(next, options, context).await;
        }
    }

    /// The pending load if it is the one `seq` belongs to.
    fn take_pending(&mut self, seq: u64) -> Option<PendingLoad> {
        if self.pending.as_ref().is_some_and(|p| p.seq == seq) {
            return self.pending.take();
        }
        tracing::debug!(seq, "Dropping result of a superseded load");
        None
    }

    /// Cancel the in-flight load, if any, and answer its caller.
    fn abandon_load(&mut self, error: Error) {
        if let Some(pending) = self.pending.take() {
            tracing::debug!(
                seq = pending.seq,
                entry_id = %pending.target.entry.id,
                error = %error,
                "Abandoning in-flight load"
            );
            pending.cancel.cancel();
            pending.context.responder.send(Err(error));
        }
    }

    async fn on_resolved(&mut self, seq: u64, result: Result<ResolvedSource>) {
        let Some(mut pending) = self.take_pending(seq) else {
            return;
        };
        let source = match result {
            Ok(source) => source,
            Err(e) => {
                self.settle(pending, Err(e)).await;
                return;
            }
        };
        if source.fresh_metadata {
            self.store_metadata(pending.target.playlist_id, pending.target.entry.id, source.metadata.clone());
        }

        let device = pending.target.device.clone();
        if self.deps.player.is_connected() && self.session.device_id.as_ref() == Some(&device.id) {
            self.start_stream(pending, source).await;
            return;
        }
        pending.source = Some(source);
        let cancel = pending.cancel.clone();
        self.pending = Some(pending);
        self.spawn_connect(device, ConnectPurpose::Load(seq), cancel);
    }

    /// Leave the previous media behind and hand the new stream to a worker
    /// that loads it on the device.
    async fn start_stream(&mut self, mut pending: PendingLoad, source: ResolvedSource) {
        let entry_id = pending.target.entry.id;
        let kind = pending.target.kind;
        tracing::info!(entry_id = %entry_id, path = %pending.target.entry.path, kind = %kind, "Loading file");
        self.set_state(PlaybackState::Loading);
        self.emit(EventPayload::FileLoading { entry_id });
        self.deps.processes.kill_all().await;
        self.deps.streamer.clear();
        self.deps.thumbnails.clear().await;

        let duration = source.metadata.duration_secs();
        let seek = if source.metadata.is_live() {
            0.0
        } else {
            self.start_offset(&pending.target.entry, pending.options, duration)
        };
        let transcoded = kind.is_local() || kind == FileKind::Hls;

        let (url, content_type) = if transcoded {
            match self.plan_transcode(&pending.target, &source, seek) {
                Ok(stream) => stream,
                Err(e) => {
                    self.settle(pending, Err(e)).await;
                    return;
                }
            }
        } else {
            let content_type = if source.metadata.is_audio_only() {
                "audio/mpeg"
            } else {
                "video/mp4"
            };
            (source.url.clone(), content_type.to_string())
        };

        let subtitle_seek = if transcoded { seek } else { 0.0 };
        let subtitles = self.subtitle_job(&pending.target.entry, kind, &source.metadata, subtitle_seek);
        let request = MediaLoadRequest {
            url,
            content_type,
            title: source.title.clone(),
            duration_secs: duration,
            seek_secs: if transcoded { 0.0 } else { seek },
            subtitle_url: None,
            thumbnail_url: source.preview_image.clone(),
            is_live: source.metadata.is_live(),
        };

        let seq = pending.seq;
        let deps = self.deps.clone();
        let events = self.worker_tx.clone();
        let cancel = pending.cancel.clone();
        let name = pending.target.entry.name.clone();
        tokio::spawn(async move {
            let result = load_on_device(&deps, request, subtitles, &name, &cancel).await;
            let _ = events.send(WorkerEvent::Loaded { seq, result }).await;
        });

        pending.stream = Some(StreamPlan {
            source,
            seek,
            transcoded,
            duration,
        });
        self.pending = Some(pending);
    }

    async fn on_loaded(&mut self, seq: u64, result: Result<MediaStatus>) {
        let Some(mut pending) = self.take_pending(seq) else {
            return;
        };
        let status = match result {
            Ok(status) => status,
            Err(e) => {
                self.settle(pending, Err(e)).await;
                return;
            }
        };
        let Some(stream) = pending.stream.take() else {
            self.settle(pending, Err(Error::Internal("device answered a load that was never sent".into())))
                .await;
            return;
        };

        let target = &pending.target;
        let entry_id = target.entry.id;
        let StreamPlan {
            source,
            seek,
            transcoded,
            duration,
        } = stream;
        let duration = duration.or(status.duration_secs);
        self.session.current = Some(CurrentMedia {
            playlist_id: target.playlist_id,
            entry_id,
            position: target.entry.position,
            kind: target.kind,
            title: source.title.clone(),
            duration_secs: duration,
            seek_offset_secs: if transcoded { seek } else { 0.0 },
            elapsed_secs: seek,
            transcoded,
        });
        self.set_state(PlaybackState::Playing);
        self.emit(EventPayload::FileLoaded {
            entry_id,
            title: source.title.clone(),
            duration_secs: duration.unwrap_or(0.0),
            seek_secs: seek,
        });

        let playback = &self.deps.config.playback;
        let preview = PreviewSource {
            path: source.url.clone(),
            kind: target.kind,
            duration_secs: duration,
            frame_rate: source.metadata.primary_video().and_then(|v| v.avg_frame_rate),
            is_audio_only: source.metadata.is_audio_only(),
            static_image: source.preview_image,
            hw_accel: select_hw_accelerator(
                &source.metadata,
                &playback.available_hw_accels,
                playback.enable_hardware_acceleration,
                None,
            ),
        };
        self.deps.thumbnails.set_source(preview).await;

        tracing::info!(
            entry_id = %entry_id,
            seek_secs = seek,
            transcoded,
            device_time = status.current_time_secs,
            "File loaded"
        );
        self.settle(pending, Ok(())).await;
    }

    /// Install the transcode plan the `/media` route serves and return the
    /// URL and content type the device is given.
    fn plan_transcode(&self, target: &LoadTarget, source: &ResolvedSource, seek: f64) -> Result<(String, String)> {
        if !self.deps.streamer.is_available() {
            return Err(Error::tool("ffmpeg", "ffmpeg is required to stream this source"));
        }
        let playback = &self.deps.config.playback;
        let file_options = &self.session.file_options;
        let inputs = DecisionInputs {
            force_video: playback.force_video_transcode,
            force_audio: playback.force_audio_transcode,
            scale: file_options.video_scale.unwrap_or(playback.video_scale),
            video_stream: None,
            audio_stream: file_options.audio_stream,
            enable_hw: playback.enable_hardware_acceleration,
            available_hw: &playback.available_hw_accels,
        };
        let quality = file_options.quality.unwrap_or(playback.video_quality);
        let mut request =
            TranscodeRequest::from_metadata(&source.url, target.kind, &source.metadata, inputs, quality, seek);
        if target.kind == FileKind::Hls {
            request = request.with_hw(HwAccelDeviceType::None);
        }
        let content_type = request.content_type().to_string();
        self.deps.streamer.set_plan(request);
        let url = format!(
            "{}/media?entry={}&t={}",
            self.deps.config.base_url(),
            target.entry.id,
            seek.floor() as i64
        );
        Ok((url, content_type))
    }

    fn start_offset(&self, entry: &PlaylistEntry, options: PlayOptions, duration: Option<f64>) -> f64 {
        let requested = match options.seek_secs {
            Some(secs) => secs,
            None if self.deps.config.playback.start_files_from_the_start => 0.0,
            None if entry.played_percentage >= 100.0 => 0.0,
            None => entry.elapsed_secs,
        };
        clamp_seek(requested, duration)
    }

    /// The subtitle conversion for the selected track, if any.
    fn subtitle_job(
        &self,
        entry: &PlaylistEntry,
        kind: FileKind,
        metadata: &StreamMetadata,
        seek_secs: f64,
    ) -> Option<SubtitleJob> {
        let options = &self.session.file_options;
        let selected = if let Some(path) = &options.external_subtitle {
            Some(SubtitleSource::External(path.clone()))
        } else if !kind.is_local() {
            None
        } else if let Some(stream) = options.subtitle_stream {
            Some(SubtitleSource::Embedded {
                input: entry.path.clone(),
                stream,
            })
        } else if self.deps.config.playback.load_first_subtitle_found_automatically {
            metadata
                .first_text_subtitle()
                .map(|(stream, _)| SubtitleSource::Embedded {
                    input: entry.path.clone(),
                    stream,
                })
        } else {
            None
        };
        let source = selected?;

        let Some(ffmpeg) = &self.deps.ffmpeg else {
            tracing::warn!(entry_id = %entry.id, "Subtitles skipped: ffmpeg not available");
            return None;
        };
        Some(SubtitleJob {
            ffmpeg: ffmpeg.clone(),
            request: SubtitleRequest {
                source,
                seek_secs,
                delay_secs: self.deps.config.playback.subtitle_delay_secs,
                output: self.deps.config.paths.subtitle_file(),
            },
            url: format!("{}/subtitles?entry={}", self.deps.config.base_url(), entry.id),
        })
    }

    // -----------------------------------------------------------------------
    // Transport verbs
    // -----------------------------------------------------------------------

    fn loaded_media(&self) -> Result<CurrentMedia> {
        match &self.session.current {
            Some(current) if self.session.state.has_media() => Ok(current.clone()),
            _ => Err(Error::InvalidState("no file is loaded".into())),
        }
    }

    async fn pause(&mut self) -> Result<()> {
        let current = self.loaded_media()?;
        if self.session.state == PlaybackState::Paused {
            return Ok(());
        }
        self.deps.player.pause().await?;
        self.set_state(PlaybackState::Paused);
        self.emit(EventPayload::Paused {
            entry_id: current.entry_id,
        });
        Ok(())
    }

    async fn resume(&mut self) -> Result<()> {
        let current = self.loaded_media()?;
        if self.session.state == PlaybackState::Playing {
            return Ok(());
        }
        self.deps.player.resume().await?;
        self.set_state(PlaybackState::Playing);
        self.emit(EventPayload::Resumed {
            entry_id: current.entry_id,
        });
        Ok(())
    }

    /// Seeking a transcoded stream restarts the transcode at the target, so
    /// it goes back through `Loading`.
    async fn seek(&mut self, secs: f64, responder: Responder) {
        let current = match self.loaded_media() {
            Ok(current) => current,
            Err(e) => {
                responder.send(Err(e));
                return;
            }
        };
        let target = clamp_seek(secs, current.duration_secs);

        if current.transcoded {
            tracing::info!(entry_id = %current.entry_id, target, "Restarting transcode at new offset");
            let options = PlayOptions::user().forced().at(target);
            self.play(current.entry_id, options, LoadContext::new(responder))
                .await;
            return;
        }

        let result = self.deps.player.seek(target).await;
        if result.is_ok() {
            if let Some(current) = self.session.current.as_mut() {
                current.elapsed_secs = target;
            }
        }
        responder.send(result);
    }

    async fn go_to_position(&mut self, percentage: f64, responder: Responder) {
        let duration = self.loaded_media().and_then(|current| {
            current
                .duration_secs
                .ok_or_else(|| Error::NotReady("duration is unknown".into()))
        });
        match duration {
            Ok(duration) => {
                self.seek(duration * percentage.clamp(0.0, 100.0) / 100.0, responder)
                    .await
            }
            Err(e) => responder.send(Err(e)),
        }
    }

    async fn add_seconds(&mut self, delta: f64, responder: Responder) {
        match self.loaded_media() {
            Ok(current) => self.seek(current.elapsed_secs + delta, responder).await,
            Err(e) => responder.send(Err(e)),
        }
    }

    async fn set_volume(&mut self, level: f64, muted: bool) -> Result<()> {
        let level = level.clamp(0.0, 1.0);
        if self.deps.player.is_connected() {
            self.deps.player.set_volume(level, muted).await?;
        }
        self.apply_volume(level, muted);
        Ok(())
    }

    fn apply_volume(&mut self, level: f64, muted: bool) {
        if self.session.volume == level && self.session.muted == muted {
            return;
        }
        self.session.volume = level;
        self.session.muted = muted;
        self.emit(EventPayload::VolumeChanged { level, muted });
    }

    /// Idempotent: stopping a stopped session does nothing.
    async fn stop(&mut self, preserve_loop: bool) -> Result<()> {
        self.abandon_load(Error::Cancelled);
        if self.session.state == PlaybackState::Stopped && self.session.current.is_none() {
            // The handle cancels before queueing; re-arm for the next play.
            self.renew_cancel_token();
            return Ok(());
        }
        self.teardown(preserve_loop).await;
        Ok(())
    }

    async fn teardown(&mut self, preserve_loop: bool) {
        self.abandon_load(Error::Cancelled);
        self.renew_cancel_token();
        self.deps.processes.kill_all().await;
        self.deps.streamer.clear();
        if self.deps.player.is_connected() {
            if let Err(e) = self.deps.player.stop().await {
                tracing::warn!(error = %e, "Device did not acknowledge stop");
            }
        }
        self.deps.thumbnails.clear().await;
        self.session.current = None;

        if !preserve_loop {
            let cleared = self.deps.library.write().disable_all_loops();
            for entry_id in cleared {
                self.emit(EventPayload::LoopChanged {
                    entry_id,
                    looping: false,
                });
            }
        }

        self.set_state(PlaybackState::Stopped);
        self.emit(EventPayload::Stopped);
    }

    /// Report a process or device failure and route back to `Stopped`.
    async fn fail(&mut self, entry_id: Option<EntryId>, error: Error) {
        tracing::error!(entry_id = ?entry_id, error = %error, "Playback failed");
        self.set_state(PlaybackState::Error);
        self.emit(EventPayload::PlaybackError {
            entry_id,
            kind: error.kind(),
            message: error.to_string(),
        });
        self.teardown(true).await;
    }

    async fn on_stream_failed(&mut self, error: Error) {
        let active = matches!(
            self.session.state,
            PlaybackState::Loading | PlaybackState::Playing | PlaybackState::Paused
        );
        if !active || matches!(error, Error::Cancelled | Error::NotReady(_)) {
            tracing::debug!(error = %error, "Ignoring stream failure outside playback");
            return;
        }
        let entry_id = self.session.current.as_ref().map(|c| c.entry_id);
        self.fail(entry_id, error).await;
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    /// Move relative to the entry being loaded, or else the one playing.
    async fn navigate(&mut self, direction: NavigationDirection, automatic: bool, responder: Responder) {
        let from = match &self.pending {
            Some(pending) => Some((
                pending.target.playlist_id,
                CurrentRef {
                    id: pending.target.entry.id,
                    position: pending.target.entry.position,
                },
            )),
            None => self.session.current.as_ref().map(|current| {
                (
                    current.playlist_id,
                    CurrentRef {
                        id: current.entry_id,
                        position: current.position,
                    },
                )
            }),
        };
        let Some((playlist_id, current)) = from else {
            responder.send(Err(Error::InvalidState("nothing is playing".into())));
            return;
        };

        let previous = self.session.state;
        self.set_state(PlaybackState::Navigating);
        self.session.navigation += 1;

        let outcome = {
            let library = self.deps.library.read();
            match library.playlist(playlist_id) {
                Some(playlist) => self.navigator.resolve(playlist, &current, direction),
                None => NavigationOutcome::EndOfPlaylist,
            }
        };
        tracing::debug!(?direction, ?outcome, automatic, "Navigation resolved");

        let options = if automatic {
            PlayOptions::automatic()
        } else {
            PlayOptions::user().forced()
        };
        let context = LoadContext {
            restore: Some(previous),
            ..LoadContext::new(responder)
        };
        match outcome {
            NavigationOutcome::Replay(id) => self.play(id, options.at(0.0), context).await,
            NavigationOutcome::Entry(id) => self.play(id, options, context).await,
            NavigationOutcome::EndOfPlaylist => {
                tracing::info!(playlist_id = %playlist_id, "End of playlist");
                let result = self.stop(false).await;
                context.responder.send(result);
            }
        }
    }

    /// The entry after `failed` when skipping unplayable files. A looping
    /// entry that cannot play is not retried.
    fn skip_target(&mut self, failed: EntryId) -> Option<EntryId> {
        let library = self.deps.library.read();
        let (playlist, entry) = library.find_entry(failed)?;
        let current = CurrentRef {
            id: failed,
            position: entry.position,
        };
        match self.navigator.resolve(playlist, &current, NavigationDirection::Next) {
            NavigationOutcome::Entry(id) => Some(id),
            NavigationOutcome::Replay(_) | NavigationOutcome::EndOfPlaylist => None,
        }
    }

    fn playlist_len_of(&self, entry_id: EntryId) -> usize {
        self.deps
            .library
            .read()
            .find_entry(entry_id)
            .map(|(playlist, _)| playlist.len())
            .unwrap_or(0)
    }

    // -----------------------------------------------------------------------
    // Device
    // -----------------------------------------------------------------------

    async fn connect(&mut self, device_id: DeviceId, reply: Reply<()>) {
        let Some(device) = self.deps.devices.get(&device_id) else {
            let _ = reply.send(Err(Error::not_found("device", &device_id)));
            return;
        };
        if self.session.device_id.as_ref() == Some(&device_id) && self.deps.player.is_connected() {
            let _ = reply.send(Ok(()));
            return;
        }
        if self.session.state == PlaybackState::Connecting {
            let _ = reply.send(Err(Error::Connecting("a device connection is in progress".into())));
            return;
        }

        self.abandon_load(Error::Cancelled);
        if self.session.current.is_some() {
            if let Err(e) = self.stop(true).await {
                let _ = reply.send(Err(e));
                return;
            }
        }
        // Switching receivers: the old connection is closed first.
        self.close_connection().await;
        let cancel = self.cancel.lock().child_token();
        self.spawn_connect(device, ConnectPurpose::Request(reply), cancel);
    }

    fn spawn_connect(&mut self, device: DeviceDescriptor, purpose: ConnectPurpose, cancel: CancellationToken) {
        let previous = self.session.state;
        self.set_state(PlaybackState::Connecting);

        let player = self.deps.player.clone();
        let events = self.worker_tx.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                result = player.connect(&device) => result,
                _ = cancel.cancelled() => Err(Error::Cancelled),
            };
            let _ = events
                .send(WorkerEvent::Connected {
                    purpose,
                    device,
                    previous,
                    result,
                })
                .await;
        });
    }

    async fn on_connected(
        &mut self,
        purpose: ConnectPurpose,
        device: DeviceDescriptor,
        previous: PlaybackState,
        result: Result<u64>,
    ) {
        let outcome = match result {
            Ok(epoch) => {
                self.deps.devices.mark_connected(&device.id);
                self.session.device_id = Some(device.id.clone());
                self.session.connection = epoch;
                tracing::info!(device_id = %device.id, host = %device.host, epoch, "Connected to device");
                self.emit(EventPayload::DeviceConnected {
                    device_id: device.id.clone(),
                });
                Ok(())
            }
            Err(e) => {
                tracing::error!(device_id = %device.id, error = %e, "Device connection failed");
                Err(e)
            }
        };

        if self.session.state == PlaybackState::Connecting {
            let resting = match previous {
                PlaybackState::Disconnected | PlaybackState::Error | PlaybackState::Connecting => {
                    PlaybackState::Idle
                }
                other => other,
            };
            self.set_state(resting);
        }

        match purpose {
            ConnectPurpose::Request(reply) => {
                let _ = reply.send(outcome);
            }
            ConnectPurpose::Load(seq) => {
                let Some(mut pending) = self.take_pending(seq) else {
                    return;
                };
                match (outcome, pending.source.take()) {
                    (Ok(()), Some(source)) => self.start_stream(pending, source).await,
                    (Ok(()), None) => {
                        let error = Error::Internal("connected for a load with no resolved source".into());
                        self.settle(pending, Err(error)).await;
                    }
                    (Err(e), _) => self.settle(pending, Err(e)).await,
                }
            }
        }
    }

    /// Close the receiver connection from our side.
    async fn close_connection(&mut self) {
        if !self.deps.player.is_connected() {
            return;
        }
        if let Err(e) = self.deps.player.disconnect().await {
            tracing::warn!(error = %e, "Device did not acknowledge disconnect");
        }
        self.deps.devices.mark_all_disconnected();
        let device_id = self.session.device_id.take();
        tracing::info!(device_id = ?device_id, "Closed device connection");
        self.emit(EventPayload::Disconnected { device_id });
    }

    async fn handle_player_event(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::FileLoading | PlayerEvent::FileLoaded { .. } => {
                tracing::trace!(?event, "Device load progress");
            }
            PlayerEvent::PositionChanged { percentage } => {
                tracing::trace!(percentage, "Device position");
            }
            PlayerEvent::TimeChanged { secs } => self.on_time_changed(secs),
            PlayerEvent::Paused => {
                if self.session.state == PlaybackState::Playing {
                    if let Some(entry_id) = self.session.current.as_ref().map(|c| c.entry_id) {
                        self.set_state(PlaybackState::Paused);
                        self.emit(EventPayload::Paused { entry_id });
                    }
                }
            }
            PlayerEvent::EndReached => self.on_end_reached().await,
            PlayerEvent::VolumeChanged { level, muted } => self.apply_volume(level, muted),
            PlayerEvent::Disconnected { epoch, reason } => self.on_disconnected(epoch, reason),
            PlayerEvent::LoadFailed { message } => {
                if self.session.current.is_some() || self.session.state == PlaybackState::Loading {
                    let entry_id = self.session.current.as_ref().map(|c| c.entry_id);
                    self.fail(entry_id, Error::LoadFailed(message)).await;
                }
            }
        }
    }

    fn on_time_changed(&mut self, reported_secs: f64) {
        if !self.session.state.has_media() {
            return;
        }
        let Some(current) = self.session.current.as_mut() else {
            return;
        };
        current.elapsed_secs = current.absolute_secs(reported_secs.max(0.0));
        let entry_id = current.entry_id;
        let elapsed_secs = current.elapsed_secs;
        let played_percentage = current.played_percentage();

        if let Some((_, entry)) = self.deps.library.write().find_entry_mut(entry_id) {
            entry.record_progress(elapsed_secs);
        }
        self.emit(EventPayload::TimeChanged {
            entry_id,
            elapsed_secs,
            played_percentage,
        });
    }

    async fn on_end_reached(&mut self) {
        if !self.session.state.has_media() {
            return;
        }
        let Some(current) = self.session.current.clone() else {
            return;
        };
        self.emit(EventPayload::EndReached {
            entry_id: current.entry_id,
        });

        let looping = {
            let mut library = self.deps.library.write();
            match library.find_entry_mut(current.entry_id) {
                Some((_, entry)) => {
                    entry.mark_finished();
                    entry.looping
                }
                None => false,
            }
        };
        self.emit(EventPayload::EntryUpdated {
            playlist_id: current.playlist_id,
            entry_id: current.entry_id,
        });

        if looping || self.deps.config.playback.play_next_file_automatically {
            self.navigate(NavigationDirection::Next, true, Responder::Silent)
                .await;
        } else if let Err(e) = self.stop(false).await {
            tracing::warn!(error = %e, "Failed to stop at end of media");
        }
    }

    /// Device loss clears every connection flag and returns to `Idle`. The
    /// transcode keeps running until someone stops it.
    fn on_disconnected(&mut self, epoch: u64, reason: Option<String>) {
        if self.session.device_id.is_none() || epoch < self.session.connection {
            tracing::debug!(
                epoch,
                live = self.session.connection,
                "Ignoring disconnect of a connection that is already closed"
            );
            return;
        }
        tracing::warn!(reason = reason.as_deref().unwrap_or("unknown"), epoch, "Device disconnected");
        self.abandon_load(Error::LoadFailed("device disconnected".into()));
        self.deps.devices.mark_all_disconnected();
        let device_id = self.session.device_id.take();
        self.emit(EventPayload::Disconnected { device_id });
        self.session.current = None;
        self.set_state(PlaybackState::Disconnected);
        self.set_state(PlaybackState::Idle);
    }

    // -----------------------------------------------------------------------
    // Options and library
    // -----------------------------------------------------------------------

    async fn set_file_options(&mut self, options: FileOptions, responder: Responder) {
        self.session.file_options = options;
        let Ok(current) = self.loaded_media() else {
            responder.send(Ok(()));
            return;
        };
        let reload = PlayOptions {
            file_options_changed: true,
            ..PlayOptions::user()
        };
        self.play(
            current.entry_id,
            reload.at(current.elapsed_secs),
            LoadContext::new(responder),
        )
        .await;
    }

    /// Recompute existence and metadata of an entry on a worker.
    fn refresh_entry(&mut self, entry_id: EntryId, reply: Reply<()>) {
        let (playlist_id, entry) = match self.lookup(entry_id) {
            Ok(found) => found,
            Err(e) => {
                let _ = reply.send(Err(e));
                return;
            }
        };

        if entry.is_url() {
            if let Some(mut entry) = self.entry_mut(playlist_id, entry_id) {
                entry.exists = true;
            }
            self.emit(EventPayload::EntryUpdated { playlist_id, entry_id });
            let _ = reply.send(Ok(()));
            return;
        }

        let prober = self.deps.prober.clone();
        let events = self.worker_tx.clone();
        let cancel = self.cancel.lock().child_token();
        tokio::spawn(async move {
            let exists = tokio::fs::try_exists(&entry.path).await.unwrap_or(false);
            let result = if exists {
                match prober.probe(&entry.path, &cancel).await {
                    Err(Error::NotFound { .. }) => Ok(None),
                    other => other,
                }
            } else {
                Ok(None)
            };
            let _ = events
                .send(WorkerEvent::Refreshed {
                    playlist_id,
                    entry_id,
                    exists,
                    result,
                    reply,
                })
                .await;
        });
    }

    fn apply_refresh(
        &mut self,
        playlist_id: PlaylistId,
        entry_id: EntryId,
        exists: bool,
        result: Result<Option<StreamMetadata>>,
    ) -> Result<()> {
        let metadata = result?;
        if let Some(mut entry) = self.entry_mut(playlist_id, entry_id) {
            entry.exists = exists;
            match metadata {
                Some(metadata) => entry.set_metadata(metadata),
                None => entry.metadata = None,
            }
        }
        self.emit(EventPayload::EntryUpdated { playlist_id, entry_id });
        Ok(())
    }

    fn remove_playlist(&mut self, playlist_id: PlaylistId) -> Result<()> {
        if !self.deps.library.write().remove_playlist(playlist_id) {
            return Err(Error::not_found("playlist", playlist_id));
        }
        self.emit(EventPayload::PlaylistUpdated { playlist_id });
        Ok(())
    }

    fn add_entries(&mut self, playlist_id: PlaylistId, paths: Vec<String>) -> Result<Vec<EntryId>> {
        let ids = self
            .deps
            .library
            .write()
            .require_playlist_mut(playlist_id)?
            .add_paths(paths);
        self.emit(EventPayload::PlaylistUpdated { playlist_id });
        Ok(ids)
    }

    fn remove_entries(&mut self, playlist_id: PlaylistId, entry_ids: &[EntryId]) -> Result<usize> {
        let removed = self
            .deps
            .library
            .write()
            .require_playlist_mut(playlist_id)?
            .remove(entry_ids);
        self.sync_current_position();
        self.emit(EventPayload::PlaylistUpdated { playlist_id });
        Ok(removed)
    }

    fn move_entry(&mut self, playlist_id: PlaylistId, entry_id: EntryId, position: u32) -> Result<()> {
        self.deps
            .library
            .write()
            .require_playlist_mut(playlist_id)?
            .move_entry(entry_id, position)?;
        self.sync_current_position();
        self.emit(EventPayload::PlaylistUpdated { playlist_id });
        Ok(())
    }

    fn set_playlist_flags(&mut self, playlist_id: PlaylistId, shuffle: Option<bool>, looping: Option<bool>) -> Result<()> {
        {
            let mut library = self.deps.library.write();
            let playlist = library.require_playlist_mut(playlist_id)?;
            if let Some(shuffle) = shuffle {
                playlist.shuffle = shuffle;
            }
            if let Some(looping) = looping {
                playlist.looping = looping;
            }
        }
        self.emit(EventPayload::PlaylistUpdated { playlist_id });
        Ok(())
    }

    fn set_entry_loop(&mut self, entry_id: EntryId, looping: bool) -> Result<()> {
        let changes = self.deps.library.write().set_entry_loop(entry_id, looping)?;
        for (entry_id, looping) in changes {
            self.emit(EventPayload::LoopChanged { entry_id, looping });
        }
        Ok(())
    }

    /// Keep the remembered position of the current entry in step with
    /// renumbering, so recovery after its deletion starts from the right
    /// place.
    fn sync_current_position(&mut self) {
        let Some(current) = self.session.current.as_mut() else {
            return;
        };
        if let Some((_, entry)) = self.deps.library.read().find_entry(current.entry_id) {
            current.position = entry.position;
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn lookup(&self, entry_id: EntryId) -> Result<(PlaylistId, PlaylistEntry)> {
        self.deps
            .library
            .read()
            .find_entry(entry_id)
            .map(|(playlist, entry)| (playlist.id, entry.clone()))
            .ok_or_else(|| Error::not_found("entry", entry_id))
    }

    fn entry_mut(
        &self,
        playlist_id: PlaylistId,
        entry_id: EntryId,
    ) -> Option<parking_lot::MappedRwLockWriteGuard<'_, PlaylistEntry>> {
        parking_lot::RwLockWriteGuard::try_map(self.deps.library.write(), |library| {
            library
                .playlist_mut(playlist_id)
                .and_then(|playlist| playlist.entry_mut(entry_id))
        })
        .ok()
    }

    fn mark_missing(&self, playlist_id: PlaylistId, entry_id: EntryId) {
        if let Some(mut entry) = self.entry_mut(playlist_id, entry_id) {
            entry.exists = false;
        }
        self.emit(EventPayload::EntryUpdated { playlist_id, entry_id });
    }

    fn store_metadata(&self, playlist_id: PlaylistId, entry_id: EntryId, metadata: StreamMetadata) {
        if let Some(mut entry) = self.entry_mut(playlist_id, entry_id) {
            entry.set_metadata(metadata);
        }
        self.emit(EventPayload::EntryUpdated { playlist_id, entry_id });
    }

    fn renew_cancel_token(&self) {
        let mut token = self.cancel.lock();
        token.cancel();
        *token = self.shutdown.child_token();
    }

    fn set_state(&mut self, state: PlaybackState) {
        let from = self.session.state;
        if from == state {
            return;
        }
        self.session.state = state;
        tracing::debug!(?from, to = ?state, "Session state changed");
        self.emit(EventPayload::StateChanged { from, to: state });
        self.publish();
    }

    fn emit(&self, payload: EventPayload) {
        self.deps.events.broadcast(payload);
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.session.snapshot());
    }
}

/// Worker half of resolving: find the stream metadata and the URL to play.
async fn resolve_source(
    deps: &SessionDeps,
    entry: &PlaylistEntry,
    kind: FileKind,
    cancel: &CancellationToken,
) -> Result<ResolvedSource> {
    if kind.is_local() {
        let (metadata, fresh_metadata) = match &entry.metadata {
            Some(metadata) => (metadata.clone(), false),
            None => {
                let probed = deps
                    .prober
                    .probe(&entry.path, cancel)
                    .await?
                    .ok_or_else(|| Error::NotReady(format!("no stream information for {}", entry.name)))?;
                (probed, true)
            }
        };
        return Ok(ResolvedSource {
            url: entry.path.clone(),
            title: entry.name.clone(),
            metadata,
            preview_image: None,
            fresh_metadata,
        });
    }

    if !deps.connectivity.is_online().await {
        return Err(Error::NoConnectivity(entry.path.clone()));
    }
    // Resolved URLs expire, so remote entries are resolved on every play.
    let resolved = deps.resolver.resolve(&entry.path, cancel).await?;
    let Some(metadata) = resolved.metadata.or_else(|| entry.metadata.clone()) else {
        return Err(Error::NotReady(format!("no stream information for {}", entry.name)));
    };
    Ok(ResolvedSource {
        url: resolved.url,
        title: resolved.title.unwrap_or_else(|| entry.name.clone()),
        metadata,
        preview_image: resolved.preview_image,
        fresh_metadata: true,
    })
}

/// Worker half of loading: convert subtitles, then hand the stream to the
/// device. Subtitle failures only cost the subtitles.
async fn load_on_device(
    deps: &SessionDeps,
    mut request: MediaLoadRequest,
    subtitles: Option<SubtitleJob>,
    name: &str,
    cancel: &CancellationToken,
) -> Result<MediaStatus> {
    remove_stale(&deps.config.paths.subtitle_file()).await;
    if let Some(job) = subtitles {
        match generate_subtitles(&deps.processes, &job.ffmpeg, &job.request, cancel).await {
            Ok(_) => request.subtitle_url = Some(job.url),
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => tracing::warn!(error = %e, "Subtitle conversion failed; playing without"),
        }
    }

    let status = tokio::select! {
        result = deps.player.load_media(request) => result?,
        _ = cancel.cancelled() => return Err(Error::Cancelled),
    };
    status.ok_or_else(|| Error::LoadFailed(format!("device returned no status for {name}")))
}
