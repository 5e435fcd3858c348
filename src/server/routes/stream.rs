//! Device-facing routes: the media stream, its subtitles and preview tiles.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use castit_core::Error;
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use crate::server::context::AppContext;
use crate::server::error::AppError;

/// Query parameters the session appends to the URLs it hands the device.
/// They identify the load for logs and defeat device-side caching; the
/// stream served is always the current plan.
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub entry: Option<String>,
    pub t: Option<i64>,
}

/// GET /media -- the transcoded (or remuxed) stream of the current file.
pub async fn media(
    State(ctx): State<AppContext>,
    Query(query): Query<StreamQuery>,
) -> Result<impl IntoResponse, AppError> {
    tracing::debug!(entry = ?query.entry, t = ?query.t, "Device requested media stream");

    let (stream, content_type) = match ctx.streamer.open().await {
        Ok(opened) => opened,
        Err(e) => {
            if matches!(e, Error::ProcessFailure { .. } | Error::Tool { .. }) {
                ctx.session.report_stream_failure(Error::process("ffmpeg", e.to_string()));
            }
            return Err(e.into());
        }
    };

    let body = Body::from_stream(ReaderStream::new(stream));
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    ))
}

/// GET /subtitles -- WebVTT generated for the current file.
pub async fn subtitles(
    State(ctx): State<AppContext>,
    Query(query): Query<StreamQuery>,
) -> Result<impl IntoResponse, AppError> {
    let bytes = match tokio::fs::read(&ctx.subtitle_path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::not_found("subtitles", query.entry.unwrap_or_default()).into());
        }
        Err(e) => return Err(Error::from(e).into()),
    };

    Ok((
        [
            (header::CONTENT_TYPE, "text/vtt; charset=utf-8"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        bytes,
    ))
}

/// GET /thumbnails/{second} -- the preview tile covering `second`.
pub async fn thumbnail(State(ctx): State<AppContext>, Path(second): Path<i64>) -> Result<impl IntoResponse, AppError> {
    let tile = ctx.thumbnails.get_tile(second).await?;
    Ok(([(header::CONTENT_TYPE, "image/jpeg")], tile))
}
