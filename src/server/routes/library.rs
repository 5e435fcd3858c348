//! Playlist and entry management.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use castit_core::{EntryId, Error, PlaylistId};
use serde::{Deserialize, Serialize};

use super::parse_id;
use crate::playlist::{Playlist, PlaylistEntry};
use crate::server::context::AppContext;
use crate::server::error::AppError;

#[derive(Debug, Serialize)]
pub struct PlaylistSummary {
    pub id: PlaylistId,
    pub name: String,
    pub position: u32,
    pub shuffle: bool,
    pub looping: bool,
    pub entries: usize,
}

impl From<&Playlist> for PlaylistSummary {
    fn from(p: &Playlist) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            position: p.position,
            shuffle: p.shuffle,
            looping: p.looping,
            entries: p.len(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePlaylistRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse<T> {
    pub id: T,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistFlagsRequest {
    pub shuffle: Option<bool>,
    pub looping: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct AddEntriesRequest {
    pub paths: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AddEntriesResponse {
    pub ids: Vec<EntryId>,
}

#[derive(Debug, Deserialize)]
pub struct RemoveEntriesRequest {
    pub entry_ids: Vec<EntryId>,
}

#[derive(Debug, Serialize)]
pub struct RemoveEntriesResponse {
    pub removed: usize,
}

#[derive(Debug, Deserialize)]
pub struct MoveEntryRequest {
    /// New 1-based position.
    pub position: u32,
}

#[derive(Debug, Deserialize)]
pub struct LoopRequest {
    pub looping: bool,
}

/// GET /api/playlists
pub async fn list_playlists(State(ctx): State<AppContext>) -> Json<Vec<PlaylistSummary>> {
    let library = ctx.library.read();
    Json(library.playlists.iter().map(PlaylistSummary::from).collect())
}

/// POST /api/playlists
pub async fn create_playlist(
    State(ctx): State<AppContext>,
    Json(req): Json<CreatePlaylistRequest>,
) -> Result<(StatusCode, Json<CreatedResponse<PlaylistId>>), AppError> {
    if req.name.trim().is_empty() {
        return Err(Error::Validation("playlist name must not be empty".into()).into());
    }
    let id = ctx.session.add_playlist(req.name).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// GET /api/playlists/{id}
pub async fn get_playlist(State(ctx): State<AppContext>, Path(id): Path<String>) -> Result<Json<Playlist>, AppError> {
    let id: PlaylistId = parse_id(&id, "playlist")?;
    let library = ctx.library.read();
    let playlist = library
        .playlist(id)
        .cloned()
        .ok_or_else(|| Error::not_found("playlist", id))?;
    Ok(Json(playlist))
}

/// DELETE /api/playlists/{id}
pub async fn delete_playlist(State(ctx): State<AppContext>, Path(id): Path<String>) -> Result<StatusCode, AppError> {
    let id: PlaylistId = parse_id(&id, "playlist")?;
    ctx.session.remove_playlist(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /api/playlists/{id}
pub async fn update_playlist(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(req): Json<PlaylistFlagsRequest>,
) -> Result<StatusCode, AppError> {
    let id: PlaylistId = parse_id(&id, "playlist")?;
    ctx.session.set_playlist_flags(id, req.shuffle, req.looping).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/playlists/{id}/entries
pub async fn add_entries(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(req): Json<AddEntriesRequest>,
) -> Result<(StatusCode, Json<AddEntriesResponse>), AppError> {
    let id: PlaylistId = parse_id(&id, "playlist")?;
    let ids = ctx.session.add_entries(id, req.paths).await?;
    Ok((StatusCode::CREATED, Json(AddEntriesResponse { ids })))
}

/// DELETE /api/playlists/{id}/entries
pub async fn remove_entries(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(req): Json<RemoveEntriesRequest>,
) -> Result<Json<RemoveEntriesResponse>, AppError> {
    let id: PlaylistId = parse_id(&id, "playlist")?;
    let removed = ctx.session.remove_entries(id, req.entry_ids).await?;
    Ok(Json(RemoveEntriesResponse { removed }))
}

/// PUT /api/playlists/{id}/entries/{entry_id}/position
pub async fn move_entry(
    State(ctx): State<AppContext>,
    Path((id, entry_id)): Path<(String, String)>,
    Json(req): Json<MoveEntryRequest>,
) -> Result<StatusCode, AppError> {
    let id: PlaylistId = parse_id(&id, "playlist")?;
    let entry_id: EntryId = parse_id(&entry_id, "entry")?;
    ctx.session.move_entry(id, entry_id, req.position).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/entries/{id}
pub async fn get_entry(State(ctx): State<AppContext>, Path(id): Path<String>) -> Result<Json<PlaylistEntry>, AppError> {
    let id: EntryId = parse_id(&id, "entry")?;
    let library = ctx.library.read();
    let (_, entry) = library.find_entry(id).ok_or_else(|| Error::not_found("entry", id))?;
    Ok(Json(entry.clone()))
}

/// PUT /api/entries/{id}/loop
pub async fn set_entry_loop(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(req): Json<LoopRequest>,
) -> Result<StatusCode, AppError> {
    let id: EntryId = parse_id(&id, "entry")?;
    ctx.session.set_entry_loop(id, req.looping).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/entries/{id}/refresh
pub async fn refresh_entry(State(ctx): State<AppContext>, Path(id): Path<String>) -> Result<StatusCode, AppError> {
    let id: EntryId = parse_id(&id, "entry")?;
    ctx.session.refresh_entry(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
