//! The single playback session: an actor that owns playback state, and the
//! handle callers use to drive it.

mod controller;
mod handle;
pub mod state;

pub use controller::{spawn_session, SessionDeps};
pub use handle::SessionHandle;
pub use state::{clamp_seek, FileOptions, PlayOptions, SessionSnapshot};
