//! Cast devices and the playback collaborator that talks to them.
//!
//! The wire protocol lives behind [`Player`]; the orchestrator only sees
//! typed commands going out and [`PlayerEvent`]s coming back.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use castit_core::{DeviceId, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// A discovered cast target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub id: DeviceId,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub is_connected: bool,
}

impl DeviceDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            id: DeviceId::new(id),
            name: name.into(),
            host: host.into(),
            port,
            is_connected: false,
        }
    }
}

/// Devices seen so far. Entries are never removed, only marked
/// disconnected.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: RwLock<Vec<DeviceDescriptor>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device, or refresh host/port/name of a known one.
    pub fn register(&self, device: DeviceDescriptor) {
        let mut devices = self.devices.write();
        match devices.iter_mut().find(|d| d.id == device.id) {
            Some(known) => {
                known.name = device.name;
                known.host = device.host;
                known.port = device.port;
            }
            None => {
                tracing::info!(device_id = %device.id, host = %device.host, "Device discovered");
                devices.push(device);
            }
        }
    }

    pub fn get(&self, id: &DeviceId) -> Option<DeviceDescriptor> {
        self.devices.read().iter().find(|d| &d.id == id).cloned()
    }

    pub fn list(&self) -> Vec<DeviceDescriptor> {
        self.devices.read().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }

    pub fn connected(&self) -> Option<DeviceDescriptor> {
        self.devices.read().iter().find(|d| d.is_connected).cloned()
    }

    /// The connected device, else the first one discovered.
    pub fn preferred(&self) -> Option<DeviceDescriptor> {
        let devices = self.devices.read();
        devices
            .iter()
            .find(|d| d.is_connected)
            .or_else(|| devices.first())
            .cloned()
    }

    /// Mark `id` connected and every other device disconnected.
    pub fn mark_connected(&self, id: &DeviceId) -> bool {
        let mut found = false;
        for device in self.devices.write().iter_mut() {
            device.is_connected = &device.id == id;
            found |= device.is_connected;
        }
        found
    }

    pub fn mark_all_disconnected(&self) {
        for device in self.devices.write().iter_mut() {
            device.is_connected = false;
        }
    }
}

/// What the device is asked to load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaLoadRequest {
    pub url: String,
    pub content_type: String,
    pub title: String,
    pub duration_secs: Option<f64>,
    /// Offset the device should start at. Zero for transcoded streams,
    /// which already begin at the requested offset.
    pub seek_secs: f64,
    pub subtitle_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub is_live: bool,
}

/// Device-reported status after a successful load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaStatus {
    pub current_time_secs: f64,
    pub duration_secs: Option<f64>,
}

/// Notifications pushed by the device session.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    FileLoading,
    FileLoaded { duration_secs: Option<f64> },
    /// Current time in seconds, relative to the start of the loaded stream.
    TimeChanged { secs: f64 },
    /// Playback position as a percentage of the loaded stream.
    PositionChanged { percentage: f64 },
    Paused,
    EndReached,
    VolumeChanged { level: f64, muted: bool },
    /// `epoch` is the connection the loss belongs to, as returned by
    /// [`Player::connect`].
    Disconnected { epoch: u64, reason: Option<String> },
    LoadFailed { message: String },
}

/// The device-session collaborator.
#[async_trait]
pub trait Player: Send + Sync {
    /// Open a connection and return its epoch. Epochs increase with every
    /// connect, so events from an older connection can be told apart.
    async fn connect(&self, device: &DeviceDescriptor) -> Result<u64>;

    /// Load and start media. `Ok(None)` means the device gave no status,
    /// which the orchestrator treats as a rejected load.
    async fn load_media(&self, request: MediaLoadRequest) -> Result<Option<MediaStatus>>;

    async fn seek(&self, secs: f64) -> Result<()>;
    async fn pause(&self) -> Result<()>;
    async fn resume(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
    async fn set_volume(&self, level: f64, muted: bool) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;

    fn is_connected(&self) -> bool;

    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent>;
}

/// A player with no wire protocol behind it. Every command succeeds and is
/// logged, so the streaming routes can be exercised by fetching the logged
/// URLs by hand.
pub struct LoggingPlayer {
    connected: AtomicBool,
    epoch: AtomicU64,
    events: broadcast::Sender<PlayerEvent>,
}

impl LoggingPlayer {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            connected: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            events,
        }
    }
}

impl Default for LoggingPlayer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Player for LoggingPlayer {
    async fn connect(&self, device: &DeviceDescriptor) -> Result<u64> {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(device_id = %device.id, host = %device.host, port = device.port, epoch, "Dry-run connect");
        self.connected.store(true, Ordering::SeqCst);
        Ok(epoch)
    }

    async fn load_media(&self, request: MediaLoadRequest) -> Result<Option<MediaStatus>> {
        tracing::info!(
            url = %request.url,
            content_type = %request.content_type,
            subtitles = request.subtitle_url.as_deref().unwrap_or("-"),
            seek = request.seek_secs,
            "Dry-run load"
        );
        Ok(Some(MediaStatus {
            current_time_secs: request.seek_secs,
            duration_secs: request.duration_secs,
        }))
    }

    async fn seek(&self, secs: f64) -> Result<()> {
        tracing::info!(secs, "Dry-run seek");
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        tracing::info!("Dry-run pause");
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        tracing::info!("Dry-run resume");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        tracing::info!("Dry-run stop");
        Ok(())
    }

    async fn set_volume(&self, level: f64, muted: bool) -> Result<()> {
        tracing::info!(level, muted, "Dry-run volume");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        let epoch = self.epoch.load(Ordering::SeqCst);
        let _ = self.events.send(PlayerEvent::Disconnected { epoch, reason: None });
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }
}
