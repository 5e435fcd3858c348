//! Playlist model, navigation, and persistence.

pub mod model;
pub mod navigation;
pub mod store;

pub use model::{Library, Playlist, PlaylistEntry};
pub use navigation::{CurrentRef, NavigationDirection, NavigationOutcome, NavigationResolver};
pub use store::{spawn_save_job, JsonLibraryStore, LibraryStore};
