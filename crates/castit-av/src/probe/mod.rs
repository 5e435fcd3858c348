//! Media probing.
//!
//! [`MediaProber`] is the seam the session controller depends on; the
//! production backend is [`FfprobeProber`].

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub mod ffprobe;
pub mod types;

pub use self::ffprobe::FfprobeProber;
pub use self::types::{AudioStream, FormatInfo, StreamMetadata, SubtitleStream, VideoStream};

/// A prober capable of extracting stream metadata from a local path or URL.
///
/// Implementations must be safe to share across tasks (`Send + Sync`).
#[async_trait]
pub trait MediaProber: Send + Sync {
    /// Human-readable name identifying this prober implementation.
    fn name(&self) -> &'static str;

    /// Probe a source and extract its stream metadata.
    ///
    /// - `Err(NotFound)` when a local path does not exist (checked before any
    ///   process is spawned).
    /// - `Err(Cancelled)` when `cancel` fires first.
    /// - `Ok(None)` when the prober could not run or its output could not be
    ///   parsed; the failure is logged, never raised.
    async fn probe(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> castit_core::Result<Option<StreamMetadata>>;
}
