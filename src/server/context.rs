//! Shared state handed to every route handler.

use std::path::PathBuf;
use std::sync::Arc;

use castit_av::ThumbnailCache;
use castit_core::config::Config;
use castit_core::events::EventBus;
use parking_lot::RwLock;

use crate::device::DeviceRegistry;
use crate::playlist::Library;
use crate::session::SessionHandle;
use crate::streaming::MediaStreamer;

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub session: SessionHandle,
    pub library: Arc<RwLock<Library>>,
    pub devices: Arc<DeviceRegistry>,
    pub streamer: Arc<MediaStreamer>,
    pub thumbnails: Arc<ThumbnailCache>,
    pub events: Arc<EventBus>,
    /// Where the session writes the WebVTT for the current file.
    pub subtitle_path: PathBuf,
}
