//! Playback control: every handler forwards to the session actor.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use castit_core::EntryId;
use serde::{Deserialize, Serialize};

use super::parse_id;
use crate::server::context::AppContext;
use crate::server::error::AppError;
use crate::session::{FileOptions, PlayOptions, SessionSnapshot};

#[derive(Debug, Deserialize)]
pub struct PlayRequest {
    pub entry_id: String,
    /// Start offset; omitted resumes from the stored elapsed time.
    pub seek_secs: Option<f64>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
pub struct StopRequest {
    #[serde(default)]
    pub preserve_loop: bool,
}

#[derive(Debug, Deserialize)]
pub struct SeekRequest {
    pub secs: f64,
}

#[derive(Debug, Deserialize)]
pub struct PositionRequest {
    pub percentage: f64,
}

#[derive(Debug, Deserialize)]
pub struct SkipRequest {
    pub delta: f64,
}

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    pub level: f64,
    #[serde(default)]
    pub muted: bool,
}

#[derive(Debug, Serialize)]
pub struct NavigateResponse {
    /// False when the request was dropped because another skip was running.
    pub accepted: bool,
}

/// GET /api/state
pub async fn state(State(ctx): State<AppContext>) -> Json<SessionSnapshot> {
    Json(ctx.session.snapshot())
}

/// POST /api/play
pub async fn play(State(ctx): State<AppContext>, Json(req): Json<PlayRequest>) -> Result<StatusCode, AppError> {
    let entry_id: EntryId = parse_id(&req.entry_id, "entry")?;
    let mut options = PlayOptions::user();
    if req.force {
        options = options.forced();
    }
    if let Some(secs) = req.seek_secs {
        options = options.at(secs);
    }
    ctx.session.play_with(entry_id, options).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/pause
pub async fn pause(State(ctx): State<AppContext>) -> Result<StatusCode, AppError> {
    ctx.session.pause().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/resume
pub async fn resume(State(ctx): State<AppContext>) -> Result<StatusCode, AppError> {
    ctx.session.resume().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/toggle-pause
pub async fn toggle_pause(State(ctx): State<AppContext>) -> Result<StatusCode, AppError> {
    ctx.session.toggle_pause().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/stop?preserve_loop=true
pub async fn stop(State(ctx): State<AppContext>, Query(req): Query<StopRequest>) -> Result<StatusCode, AppError> {
    ctx.session.stop_with(req.preserve_loop).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/next
pub async fn next(State(ctx): State<AppContext>) -> Result<Json<NavigateResponse>, AppError> {
    let accepted = ctx.session.next().await?;
    Ok(Json(NavigateResponse { accepted }))
}

/// POST /api/previous
pub async fn previous(State(ctx): State<AppContext>) -> Result<Json<NavigateResponse>, AppError> {
    let accepted = ctx.session.previous().await?;
    Ok(Json(NavigateResponse { accepted }))
}

/// POST /api/seek
pub async fn seek(State(ctx): State<AppContext>, Json(req): Json<SeekRequest>) -> Result<StatusCode, AppError> {
    ctx.session.seek(req.secs).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/position
pub async fn go_to_position(
    State(ctx): State<AppContext>,
    Json(req): Json<PositionRequest>,
) -> Result<StatusCode, AppError> {
    ctx.session.go_to_position(req.percentage).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/skip
pub async fn skip(State(ctx): State<AppContext>, Json(req): Json<SkipRequest>) -> Result<StatusCode, AppError> {
    ctx.session.add_seconds(req.delta).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/volume
pub async fn volume(State(ctx): State<AppContext>, Json(req): Json<VolumeRequest>) -> Result<StatusCode, AppError> {
    ctx.session.set_volume(req.level, req.muted).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/file-options
pub async fn file_options(
    State(ctx): State<AppContext>,
    Json(options): Json<FileOptions>,
) -> Result<StatusCode, AppError> {
    ctx.session.set_file_options(options).await?;
    Ok(StatusCode::NO_CONTENT)
}
