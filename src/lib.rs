//! castit - playback orchestration for cast devices.
//!
//! This library crate exposes the orchestrator for the binary and for
//! integration testing.

pub mod connectivity;
pub mod device;
pub mod playlist;
pub mod resolver;
pub mod server;
pub mod session;
pub mod streaming;
