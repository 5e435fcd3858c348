//! Preview tile cache.
//!
//! The played file is partitioned into fixed-width second ranges. Each range
//! owns one composite tile (a grid of frames) that is generated on first
//! request, together with its two neighbours.

use std::sync::Arc;

use async_trait::async_trait;
use castit_core::{Error, FileKind, HwAccelDeviceType, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub mod generator;

pub use generator::FfmpegTileGenerator;

/// A contiguous span of seconds mapped to one preview image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailRange {
    pub index: usize,
    /// First second covered (inclusive).
    pub minimum: i64,
    /// Last second covered (inclusive).
    pub maximum: i64,
    #[serde(skip)]
    pub tile: Option<Vec<u8>>,
}

impl ThumbnailRange {
    fn empty(index: usize, minimum: i64, maximum: i64) -> Self {
        Self {
            index,
            minimum,
            maximum,
            tile: None,
        }
    }

    pub fn is_populated(&self) -> bool {
        self.tile.is_some()
    }

    /// Number of seconds covered.
    pub fn span_secs(&self) -> i64 {
        self.maximum.saturating_sub(self.minimum).saturating_add(1)
    }
}

/// Upper bound on ranges per file; the last range absorbs the remainder.
pub const MAX_RANGES: usize = 4096;

/// Split `[0, total_secs]` into inclusive ranges of `window_secs` seconds.
/// The final range is clipped to `total_secs`, or stretched to it once
/// `MAX_RANGES` is reached.
pub fn partition(total_secs: i64, window_secs: i64) -> Vec<ThumbnailRange> {
    let total = total_secs.max(0);
    let window = window_secs.max(1);
    let count = usize::try_from(total / window)
        .map_or(MAX_RANGES, |n| n.saturating_add(1))
        .min(MAX_RANGES);
    let mut ranges = Vec::with_capacity(count);
    let mut start = 0i64;
    while start <= total {
        let end = if ranges.len() + 1 == count {
            total
        } else {
            start.saturating_add(window - 1).min(total)
        };
        ranges.push(ThumbnailRange::empty(ranges.len(), start, end));
        if end == total {
            break;
        }
        start = end + 1;
    }
    ranges
}

/// The source the cache renders previews for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewSource {
    /// Local path or URL of the media.
    pub path: String,
    pub kind: FileKind,
    pub duration_secs: Option<f64>,
    pub frame_rate: Option<f64>,
    /// Audio-only files have no filmstrip, only cover art.
    pub is_audio_only: bool,
    /// Image used as the single preview of non-seekable sources. Falls back
    /// to the first picture in `path`.
    pub static_image: Option<String>,
    /// Accelerator for decoding; already downgraded for unsupported codecs.
    pub hw_accel: HwAccelDeviceType,
}

impl PreviewSource {
    /// Remote and audio-only sources get a single static preview instead of
    /// generated filmstrips.
    pub fn is_seekable(&self) -> bool {
        self.kind.is_seekable_for_previews() && !self.is_audio_only
    }

    fn total_secs(&self) -> Option<i64> {
        self.duration_secs
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| d.floor() as i64)
    }
}

/// Produces preview images; the production backend is [`FfmpegTileGenerator`].
#[async_trait]
pub trait TileGenerator: Send + Sync {
    /// Render the composite tile for one range.
    async fn generate(
        &self,
        source: &PreviewSource,
        range: &ThumbnailRange,
        window_secs: i64,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>>;

    /// Render the single preview of a non-seekable source.
    async fn static_preview(&self, source: &PreviewSource, cancel: &CancellationToken) -> Result<Vec<u8>>;
}

#[derive(Default)]
struct CacheState {
    source: Option<PreviewSource>,
    ranges: Vec<ThumbnailRange>,
}

/// Lazily populated tile cache for the file currently playing.
///
/// A single lock guards all ranges: at most one tile is generated at a time,
/// and neighbour prefetch happens before the lock is released.
pub struct ThumbnailCache {
    generator: Arc<dyn TileGenerator>,
    window_secs: i64,
    state: Mutex<CacheState>,
    cancel: parking_lot::Mutex<CancellationToken>,
}

impl ThumbnailCache {
    pub fn new(generator: Arc<dyn TileGenerator>, window_secs: u64) -> Self {
        Self {
            generator,
            window_secs: (window_secs.max(1)).min(i64::MAX as u64) as i64,
            state: Mutex::new(CacheState::default()),
            cancel: parking_lot::Mutex::new(CancellationToken::new()),
        }
    }

    /// Abort in-flight generation and hand out a fresh token.
    fn reset_token(&self) -> CancellationToken {
        let mut guard = self.cancel.lock();
        guard.cancel();
        *guard = CancellationToken::new();
        guard.clone()
    }

    /// Rebuild the ranges for a newly played file.
    pub async fn set_source(&self, source: PreviewSource) {
        self.reset_token();
        let ranges = if source.is_seekable() {
            partition(source.total_secs().unwrap_or(0), self.window_secs)
        } else {
            let maximum = source.total_secs().unwrap_or(i64::MAX);
            vec![ThumbnailRange::empty(0, 0, maximum)]
        };

        let mut state = self.state.lock().await;
        tracing::debug!(
            path = %source.path,
            ranges = ranges.len(),
            seekable = source.is_seekable(),
            "Thumbnail ranges rebuilt"
        );
        state.ranges = ranges;
        state.source = Some(source);
    }

    /// Drop every range and tile.
    pub async fn clear(&self) {
        self.reset_token();
        let mut state = self.state.lock().await;
        *state = CacheState::default();
    }

    /// Snapshot of the current ranges.
    pub async fn ranges(&self) -> Vec<ThumbnailRange> {
        self.state.lock().await.ranges.clone()
    }

    /// The tile covering `second`, generating it (and prefetching the
    /// neighbouring ranges) on a miss.
    pub async fn get_tile(&self, second: i64) -> Result<Vec<u8>> {
        let cancel = self.cancel.lock().clone();
        let mut state = self.state.lock().await;

        let Some(source) = state.source.clone() else {
            return Err(Error::NotReady("no file is playing".into()));
        };
        if state.ranges.is_empty() {
            return Err(Error::NotReady("thumbnail ranges not built".into()));
        }

        let index = if source.is_seekable() {
            ((second.max(0) / self.window_secs) as usize).min(state.ranges.len() - 1)
        } else {
            0
        };

        if let Some(tile) = &state.ranges[index].tile {
            return Ok(tile.clone());
        }

        let tile = self.render(&source, &state.ranges[index], &cancel).await?;
        state.ranges[index].tile = Some(tile.clone());

        if source.is_seekable() {
            let neighbours = [index.checked_sub(1), Some(index + 1)];
            for neighbour in neighbours.into_iter().flatten() {
                let Some(range) = state.ranges.get(neighbour) else {
                    continue;
                };
                if range.is_populated() {
                    continue;
                }
                match self.render(&source, range, &cancel).await {
                    Ok(bytes) => state.ranges[neighbour].tile = Some(bytes),
                    Err(Error::Cancelled) => break,
                    Err(e) => {
                        tracing::warn!(range = neighbour, error = %e, "Thumbnail prefetch failed");
                    }
                }
            }
        }

        Ok(tile)
    }

    async fn render(
        &self,
        source: &PreviewSource,
        range: &ThumbnailRange,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if source.is_seekable() {
            tracing::debug!(range = range.index, min = range.minimum, max = range.maximum, "Generating tile");
            self.generator
                .generate(source, range, self.window_secs, cancel)
                .await
        } else {
            self.generator.static_preview(source, cancel).await
        }
    }
}
