//! Unified error type for the castit orchestrator.
//!
//! Validation failures (missing files, no device, metadata not probed yet)
//! are separated from process and device failures so the session controller
//! can decide between propagating an error and skipping to the next item.

use std::fmt;

/// Unified error type covering all failure modes in castit.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested file, entry or device could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "file", "entry", "device").
        entity: String,
        /// The identifier or path that was looked up.
        id: String,
    },

    /// No cast device has been registered yet.
    #[error("No cast device is registered")]
    NoDevice,

    /// Stream metadata for the entry has not been probed yet.
    #[error("Not ready: {0}")]
    NotReady(String),

    /// The entry is already playing and nothing forces a reload.
    #[error("Entry is already playing: {0}")]
    AlreadyPlaying(String),

    /// A mutually exclusive operation (device connection, navigation) is in progress.
    #[error("Operation in progress: {0}")]
    Connecting(String),

    /// The entry is a URL and the network is unavailable.
    #[error("No network connectivity to play {0}")]
    NoConnectivity(String),

    /// No handler recognizes the path.
    #[error("Unsupported source: {0}")]
    Unsupported(String),

    /// A probe/transcode/thumbnail child process failed after any fallback.
    #[error("Process failure [{tool}]: {message}")]
    ProcessFailure {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description, including the command line.
        message: String,
    },

    /// The device rejected the media.
    #[error("Device failed to load media: {0}")]
    LoadFailed(String),

    /// The operation is not valid in the current session state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Request or configuration data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An external tool could not be located or spawned.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Probe output could not be parsed.
    #[error("Probe error: {0}")]
    Probe(String),

    /// The operation was cancelled by a stop or shutdown.
    #[error("Operation cancelled")]
    Cancelled,

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of an [`Error`], carried in notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    NoDevice,
    NotReady,
    AlreadyPlaying,
    Connecting,
    NoConnectivity,
    Unsupported,
    ProcessFailure,
    LoadFailed,
    Other,
}

impl Error {
    /// Whether this is a request-validation error.
    ///
    /// Validation errors are raised to user-initiated callers but converted
    /// into "skip to the next playable item" for automatic requests.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::NotFound { .. }
                | Error::NoDevice
                | Error::NotReady(_)
                | Error::AlreadyPlaying(_)
                | Error::Connecting(_)
                | Error::NoConnectivity(_)
                | Error::Unsupported(_)
                | Error::Validation(_)
        )
    }

    /// Classify the error for notifications.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::NoDevice => ErrorKind::NoDevice,
            Error::NotReady(_) => ErrorKind::NotReady,
            Error::AlreadyPlaying(_) => ErrorKind::AlreadyPlaying,
            Error::Connecting(_) => ErrorKind::Connecting,
            Error::NoConnectivity(_) => ErrorKind::NoConnectivity,
            Error::Unsupported(_) => ErrorKind::Unsupported,
            Error::ProcessFailure { .. } | Error::Tool { .. } => ErrorKind::ProcessFailure,
            Error::LoadFailed(_) => ErrorKind::LoadFailed,
            _ => ErrorKind::Other,
        }
    }

    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound { .. } => 404,
            Error::NoDevice | Error::NotReady(_) => 503,
            Error::AlreadyPlaying(_) | Error::Connecting(_) | Error::InvalidState(_) => 409,
            Error::NoConnectivity(_) => 503,
            Error::Unsupported(_) => 415,
            Error::Validation(_) => 400,
            Error::ProcessFailure { .. } | Error::Tool { .. } | Error::LoadFailed(_) => 502,
            Error::Probe(_) => 422,
            Error::Cancelled => 499,
            Error::Io { .. } | Error::Internal(_) => 500,
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::ProcessFailure`].
    pub fn process(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ProcessFailure {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = Error::not_found("file", "/media/a.mkv");
        assert_eq!(err.to_string(), "file not found: /media/a.mkv");
        assert_eq!(err.http_status(), 404);
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn validation_classification() {
        assert!(Error::NoDevice.is_validation());
        assert!(Error::NotReady("probing".into()).is_validation());
        assert!(Error::AlreadyPlaying("a".into()).is_validation());
        assert!(Error::Connecting("device".into()).is_validation());
        assert!(Error::NoConnectivity("http://x".into()).is_validation());
        assert!(Error::Unsupported("a.xyz".into()).is_validation());
        assert!(Error::Validation("duplicate entry id".into()).is_validation());
        assert!(!Error::process("ffmpeg", "exit 1").is_validation());
        assert!(!Error::LoadFailed("rejected".into()).is_validation());
        assert!(!Error::Cancelled.is_validation());
    }

    #[test]
    fn process_failure_display() {
        let err = Error::process("ffmpeg", "exit code 1");
        assert_eq!(err.to_string(), "Process failure [ffmpeg]: exit code 1");
        assert_eq!(err.http_status(), 502);
        assert_eq!(err.kind(), ErrorKind::ProcessFailure);
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.http_status(), 500);
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::NoConnectivity).unwrap();
        assert_eq!(json, "\"no_connectivity\"");
    }
}
