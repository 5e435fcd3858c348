//! # castit-av
//!
//! Probing, transcoding, and external tool management for the castit
//! playback orchestrator.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout and
//!   cancellation support for running external processes.
//! - **Probing** ([`probe::FfprobeProber`]) -- stream metadata via ffprobe JSON.
//! - **Transcode decisions** ([`transcode`]) -- pass-through vs re-encode,
//!   hardware accelerator selection, and ffmpeg argument building.
//! - **Process ownership** ([`TranscodeProcessManager`]) -- one live transcode
//!   and one live preview process, with hardware-to-software fallback.
//! - **Subtitles** ([`subtitles`]) -- WebVTT generation at a seek offset.
//! - **Preview tiles** ([`thumbnails`]) -- range-partitioned filmstrip cache.

pub mod command;
pub mod probe;
pub mod process;
pub mod subtitles;
pub mod thumbnails;
pub mod tools;
pub mod transcode;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use probe::{FfprobeProber, MediaProber, StreamMetadata};
pub use process::{ProcessSlot, TranscodeProcessManager, TranscodeStream};
pub use thumbnails::{FfmpegTileGenerator, PreviewSource, ThumbnailCache, ThumbnailRange, TileGenerator};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
pub use transcode::{TranscodeDecision, TranscodeRequest};
