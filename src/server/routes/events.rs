//! Server-Sent Events stream of session notifications.
//!
//! Late joiners get the recent history first, then live events, with a
//! heartbeat so idle proxies keep the connection open.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use tokio_stream::wrappers::{BroadcastStream, IntervalStream};
use tokio_stream::StreamExt;

use crate::server::context::AppContext;

const REPLAY: usize = 50;

/// GET /api/events
pub async fn events_handler(State(ctx): State<AppContext>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Subscribe before reading history so nothing falls in between.
    let rx = ctx.events.subscribe();
    let mut recent = ctx.events.recent_events(REPLAY);
    recent.reverse();
    let replay_until = recent.last().map(|e| e.seq);

    let replay = tokio_stream::iter(recent).map(to_sse);
    let live = BroadcastStream::new(rx)
        .filter_map(|result| result.ok())
        .filter(move |event| replay_until.map_or(true, |seq| event.seq > seq))
        .map(to_sse);

    let heartbeat = IntervalStream::new(tokio::time::interval(Duration::from_secs(30)))
        .map(|_| Ok(Event::default().event("heartbeat").data(r#"{"type":"heartbeat"}"#)));

    Sse::new(replay.chain(live).merge(heartbeat)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn to_sse(event: castit_core::events::Event) -> Result<Event, Infallible> {
    let data = serde_json::to_string(&event)
        .unwrap_or_else(|e| format!(r#"{{"error": "serialization failed: {}"}}"#, e));
    Ok(Event::default().data(data))
}
