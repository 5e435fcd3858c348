//! Shared test harness for integration tests.
//!
//! [`TestHarness`] spawns a real session actor wired to in-process fakes: a
//! scriptable [`FakePlayer`], a map-backed [`FakeProber`] and a counting
//! [`FakeTileGenerator`]. Media files are created in a temp directory.
//! [`TestHarness::with_subtitle_tool`] also installs a shell script in place
//! of ffmpeg that logs its arguments and writes a WebVTT stub.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use castit::connectivity::Connectivity;
use castit::device::{DeviceDescriptor, DeviceRegistry, MediaLoadRequest, MediaStatus, Player, PlayerEvent};
use castit::playlist::Library;
use castit::resolver::DirectUrlResolver;
use castit::server::AppContext;
use castit::session::{spawn_session, SessionDeps, SessionHandle, SessionSnapshot};
use castit::streaming::MediaStreamer;
use castit_av::probe::{AudioStream, FormatInfo, VideoStream};
use castit_av::{
    MediaProber, PreviewSource, StreamMetadata, ThumbnailCache, ThumbnailRange, TileGenerator, ToolCommand,
    TranscodeProcessManager,
};
use castit_core::config::Config;
use castit_core::events::{EventBus, EventPayload};
use castit_core::{EntryId, Error, PlaylistId, Result};
use parking_lot::{Mutex, RwLock};
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// What [`FakePlayer::load_media`] answers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadBehavior {
    Accept,
    NoStatus,
    Reject,
}

pub struct FakePlayer {
    connected: AtomicBool,
    epoch: AtomicU64,
    events: broadcast::Sender<PlayerEvent>,
    calls: Mutex<Vec<String>>,
    loads: Mutex<Vec<MediaLoadRequest>>,
    behavior: Mutex<LoadBehavior>,
}

impl FakePlayer {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            connected: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            events,
            calls: Mutex::new(Vec::new()),
            loads: Mutex::new(Vec::new()),
            behavior: Mutex::new(LoadBehavior::Accept),
        }
    }

    pub fn set_behavior(&self, behavior: LoadBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// Push an event as if the device had sent it.
    pub fn emit(&self, event: PlayerEvent) {
        if let PlayerEvent::Disconnected { epoch, .. } = event {
            if epoch == self.epoch() {
                self.connected.store(false, Ordering::SeqCst);
            }
        }
        self.events.send(event).expect("session is subscribed");
    }

    /// Epoch of the latest connection.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// The link drops before the device gets to report it.
    pub fn drop_link(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn loads(&self) -> Vec<MediaLoadRequest> {
        self.loads.lock().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }
}

#[async_trait]
impl Player for FakePlayer {
    async fn connect(&self, device: &DeviceDescriptor) -> Result<u64> {
        self.record(format!("connect {}", device.id));
        self.connected.store(true, Ordering::SeqCst);
        Ok(self.epoch.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn load_media(&self, request: MediaLoadRequest) -> Result<Option<MediaStatus>> {
        self.record("load");
        let duration_secs = request.duration_secs;
        let current_time_secs = request.seek_secs;
        self.loads.lock().push(request);
        match *self.behavior.lock() {
            LoadBehavior::Accept => Ok(Some(MediaStatus {
                current_time_secs,
                duration_secs,
            })),
            LoadBehavior::NoStatus => Ok(None),
            LoadBehavior::Reject => Err(Error::LoadFailed("media rejected".into())),
        }
    }

    async fn seek(&self, secs: f64) -> Result<()> {
        self.record(format!("seek {secs}"));
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.record("pause");
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        self.record("resume");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.record("stop");
        Ok(())
    }

    async fn set_volume(&self, level: f64, muted: bool) -> Result<()> {
        self.record(format!("volume {level} {muted}"));
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.record("disconnect");
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }
}

/// Answers from a path-to-metadata map; unknown paths are "unavailable".
#[derive(Default)]
pub struct FakeProber {
    metadata: Mutex<HashMap<String, StreamMetadata>>,
    delay: Mutex<Option<Duration>>,
    pub calls: AtomicUsize,
}

impl FakeProber {
    pub fn insert(&self, path: impl Into<String>, metadata: StreamMetadata) {
        self.metadata.lock().insert(path.into(), metadata);
    }

    /// Make every inspection take `delay`, like ffprobe on a slow share.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Wait until `count` inspections have started.
    pub async fn wait_for_calls(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.calls.load(Ordering::SeqCst) < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("timed out waiting for the prober");
    }
}

#[async_trait]
impl MediaProber for FakeProber {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn probe(&self, path: &str, cancel: &CancellationToken) -> Result<Option<StreamMetadata>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => return Err(Error::Cancelled),
            }
        }
        Ok(self.metadata.lock().get(path).cloned())
    }
}

#[derive(Default)]
pub struct FakeTileGenerator {
    pub calls: AtomicUsize,
}

#[async_trait]
impl TileGenerator for FakeTileGenerator {
    async fn generate(
        &self,
        _source: &PreviewSource,
        range: &ThumbnailRange,
        _window_secs: i64,
        _cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![0xFF, 0xD8, range.index as u8])
    }

    async fn static_preview(&self, _source: &PreviewSource, _cancel: &CancellationToken) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![0xFF, 0xD8])
    }
}

pub struct FakeConnectivity {
    pub online: AtomicBool,
}

#[async_trait]
impl Connectivity for FakeConnectivity {
    async fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Metadata fixtures
// ---------------------------------------------------------------------------

/// h264 High@4.0 with AAC stereo: plays without re-encoding.
pub fn h264_metadata(duration_secs: f64) -> StreamMetadata {
    StreamMetadata {
        format: FormatInfo {
            format_name: "mov,mp4,m4a,3gp,3g2,mj2".into(),
            duration_secs: Some(duration_secs),
            bit_rate: Some(4_000_000),
        },
        videos: vec![VideoStream {
            index: 0,
            codec_name: "h264".into(),
            profile: Some("High".into()),
            level: Some(40),
            width: 1920,
            height: 1080,
            avg_frame_rate: Some(24.0),
            is_attached_picture: false,
        }],
        audios: vec![AudioStream {
            index: 1,
            codec_name: "aac".into(),
            profile: Some("LC".into()),
            channels: 2,
            language: Some("eng".into()),
        }],
        subtitles: vec![],
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct TestHarness {
    pub session: SessionHandle,
    pub task: JoinHandle<()>,
    pub player: Arc<FakePlayer>,
    pub prober: Arc<FakeProber>,
    pub tiles: Arc<FakeTileGenerator>,
    pub connectivity: Arc<FakeConnectivity>,
    pub library: Arc<RwLock<Library>>,
    pub devices: Arc<DeviceRegistry>,
    pub events: Arc<EventBus>,
    pub streamer: Arc<MediaStreamer>,
    pub thumbnails: Arc<ThumbnailCache>,
    pub config: Arc<Config>,
    pub shutdown: CancellationToken,
    pub dir: TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Start a session on defaults adjusted by `configure`. Paths always
    /// point into the harness temp dir.
    pub fn with_config(configure: impl FnOnce(&mut Config)) -> Self {
        Self::build(configure, false)
    }

    /// Like [`TestHarness::with_config`], with a stub ffmpeg for subtitle
    /// conversion. Its argument lists land in [`TestHarness::tool_log`].
    pub fn with_subtitle_tool(configure: impl FnOnce(&mut Config)) -> Self {
        Self::build(configure, true)
    }

    fn build(configure: impl FnOnce(&mut Config), subtitle_tool: bool) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let mut config = Config::default();
        config.paths.output_dir = dir.path().join("output");
        config.paths.library_file = dir.path().join("library.json");
        config.playback.enable_hardware_acceleration = false;
        configure(&mut config);
        let config = Arc::new(config);

        let player = Arc::new(FakePlayer::new());
        let prober = Arc::new(FakeProber::default());
        let tiles = Arc::new(FakeTileGenerator::default());
        let connectivity = Arc::new(FakeConnectivity {
            online: AtomicBool::new(true),
        });
        let library = Arc::new(RwLock::new(Library::default()));
        let devices = Arc::new(DeviceRegistry::new());
        let events = Arc::new(EventBus::default());
        let processes = Arc::new(TranscodeProcessManager::new());
        let thumbnails = Arc::new(ThumbnailCache::new(tiles.clone(), config.thumbnails.seconds_per_image));
        // `echo` stands in for ffmpeg: the stream body is the argument list.
        let streamer = Arc::new(MediaStreamer::new(
            processes.clone(),
            Some(ToolCommand::new(PathBuf::from("echo"))),
            8,
        ));
        let shutdown = CancellationToken::new();
        let ffmpeg = subtitle_tool.then(|| {
            let script = format!(
                r#"printf '%s\n' "$*" >> '{}'; for last; do :; done; printf 'WEBVTT\n' > "$last""#,
                dir.path().join("ffmpeg.log").display()
            );
            let mut cmd = ToolCommand::new(PathBuf::from("sh"));
            cmd.args(["-c", script.as_str(), "--"]);
            cmd
        });

        let deps = SessionDeps {
            config: config.clone(),
            library: library.clone(),
            devices: devices.clone(),
            player: player.clone(),
            prober: prober.clone(),
            resolver: Arc::new(DirectUrlResolver::new(prober.clone())),
            connectivity: connectivity.clone(),
            processes,
            thumbnails: thumbnails.clone(),
            streamer: streamer.clone(),
            events: events.clone(),
            ffmpeg,
        };
        let (session, task) = spawn_session(deps, shutdown.clone());

        Self {
            session,
            task,
            player,
            prober,
            tiles,
            connectivity,
            library,
            devices,
            events,
            streamer,
            thumbnails,
            config,
            shutdown,
            dir,
        }
    }

    pub fn context(&self) -> AppContext {
        AppContext {
            config: self.config.clone(),
            session: self.session.clone(),
            library: self.library.clone(),
            devices: self.devices.clone(),
            streamer: self.streamer.clone(),
            thumbnails: self.thumbnails.clone(),
            events: self.events.clone(),
            subtitle_path: self.config.paths.subtitle_file(),
        }
    }

    pub fn register_device(&self) {
        self.devices
            .register(DeviceDescriptor::new("tv", "Living room", "10.0.0.5", 8009));
    }

    /// Create a playlist of `names` inside the temp dir. Files listed in
    /// `missing` are not created; the rest exist and have metadata.
    pub fn add_playlist(&self, names: &[&str], missing: &[&str]) -> (PlaylistId, Vec<EntryId>) {
        let paths: Vec<String> = names
            .iter()
            .map(|name| {
                let path = self.dir.path().join(name);
                if !missing.contains(name) {
                    std::fs::write(&path, b"media").expect("failed to write media file");
                    self.prober
                        .insert(path.to_string_lossy(), h264_metadata(600.0));
                }
                path.to_string_lossy().into_owned()
            })
            .collect();

        let mut library = self.library.write();
        let playlist_id = library.add_playlist("test");
        let ids = library
            .require_playlist_mut(playlist_id)
            .expect("playlist just added")
            .add_paths(paths);
        (playlist_id, ids)
    }

    pub fn set_playlist_looping(&self, playlist_id: PlaylistId) {
        self.library
            .write()
            .require_playlist_mut(playlist_id)
            .expect("playlist exists")
            .looping = true;
    }

    /// Wait until the published snapshot satisfies `pred`.
    pub async fn wait_for(&self, pred: impl Fn(&SessionSnapshot) -> bool) -> SessionSnapshot {
        let mut rx = self.session.watch();
        let result = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                {
                    let snapshot = rx.borrow_and_update();
                    if pred(&snapshot) {
                        return snapshot.clone();
                    }
                }
                rx.changed().await.expect("session stopped");
            }
        })
        .await;
        result.expect("timed out waiting for session state")
    }

    /// Argument lists the stub ffmpeg was run with, one per line.
    pub fn tool_log(&self) -> String {
        std::fs::read_to_string(self.dir.path().join("ffmpeg.log")).unwrap_or_default()
    }

    /// Every event broadcast so far, oldest first.
    pub fn history(&self) -> Vec<EventPayload> {
        let mut events = self.events.recent_events(100);
        events.reverse();
        events.into_iter().map(|e| e.payload).collect()
    }
}

/// Receive events until one matches `pred`.
pub async fn next_matching(
    rx: &mut broadcast::Receiver<castit_core::events::Event>,
    pred: impl Fn(&EventPayload) -> bool,
) -> EventPayload {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.expect("event bus closed");
            if pred(&event.payload) {
                return event.payload;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}
