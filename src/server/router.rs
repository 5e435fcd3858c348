//! Axum router construction.

use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::context::AppContext;
use super::routes::{devices, events, library, session, stream};

/// Build the full router: device-facing stream routes at the root and the
/// control API under `/api`.
pub fn build_router(ctx: AppContext) -> Router {
    // Cast receivers fetch subtitles and tiles cross-origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/media", get(stream::media))
        .route("/subtitles", get(stream::subtitles))
        .route("/thumbnails/{second}", get(stream::thumbnail))
        .nest("/api", api_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

fn api_routes() -> Router<AppContext> {
    Router::new()
        .route("/state", get(session::state))
        .route("/events", get(events::events_handler))
        .route("/play", post(session::play))
        .route("/pause", post(session::pause))
        .route("/resume", post(session::resume))
        .route("/toggle-pause", post(session::toggle_pause))
        .route("/stop", post(session::stop))
        .route("/next", post(session::next))
        .route("/previous", post(session::previous))
        .route("/seek", post(session::seek))
        .route("/position", post(session::go_to_position))
        .route("/skip", post(session::skip))
        .route("/volume", put(session::volume))
        .route("/file-options", put(session::file_options))
        .route(
            "/playlists",
            get(library::list_playlists).post(library::create_playlist),
        )
        .route(
            "/playlists/{id}",
            get(library::get_playlist)
                .patch(library::update_playlist)
                .delete(library::delete_playlist),
        )
        .route(
            "/playlists/{id}/entries",
            post(library::add_entries).delete(library::remove_entries),
        )
        .route(
            "/playlists/{id}/entries/{entry_id}/position",
            put(library::move_entry),
        )
        .route("/entries/{id}", get(library::get_entry))
        .route("/entries/{id}/loop", put(library::set_entry_loop))
        .route("/entries/{id}/refresh", post(library::refresh_entry))
        .route(
            "/devices",
            get(devices::list_devices).post(devices::register_device),
        )
        .route("/devices/{id}/connect", post(devices::connect_device))
}

async fn health_check() -> StatusCode {
    StatusCode::OK
}
