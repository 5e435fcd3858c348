//! Error-to-HTTP response conversion.
//!
//! Route handlers return `Result<T, AppError>` and use `?` on
//! [`castit_core::Error`] directly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use castit_core::Error;
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
pub struct AppError(pub Error);

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl AppError {
    fn code(&self) -> &'static str {
        match &self.0 {
            Error::NotFound { .. } => "not_found",
            Error::NoDevice => "no_device",
            Error::NotReady(_) => "not_ready",
            Error::AlreadyPlaying(_) => "already_playing",
            Error::Connecting(_) => "connecting",
            Error::NoConnectivity(_) => "no_connectivity",
            Error::Unsupported(_) => "unsupported",
            Error::ProcessFailure { .. } => "process_failure",
            Error::LoadFailed(_) => "load_failed",
            Error::InvalidState(_) => "invalid_state",
            Error::Validation(_) => "validation_error",
            Error::Io { .. } => "io_error",
            Error::Tool { .. } => "tool_error",
            Error::Probe(_) => "probe_error",
            Error::Cancelled => "cancelled",
            Error::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.0, "Server error in route handler");
        }

        let body = json!({
            "error": self.0.to_string(),
            "code": self.code(),
        });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_produces_404() {
        let response = AppError(Error::not_found("entry", "abc")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn no_device_is_unavailable() {
        let response = AppError(Error::NoDevice).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(AppError(Error::NoDevice).code(), "no_device");
    }

    #[test]
    fn process_failure_is_bad_gateway() {
        let response = AppError(Error::process("ffmpeg", "exit 1")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
