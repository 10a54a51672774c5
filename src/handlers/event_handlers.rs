//! GET `/events`: server-sent stream of [`AppEvent`]s.
//!
//! Each subscriber sees only events published after it connected. A slow
//! subscriber that falls behind the channel capacity skips the missed
//! events rather than disconnecting.

use crate::{events::AppEvent, state::AppState};
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt, stream};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

pub async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let events = receive(state.events.subscribe()).map(|event| to_sse(&event));
    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Events from `rx` until the bus closes, skipping over any lag.
fn receive(rx: broadcast::Receiver<AppEvent>) -> impl Stream<Item = AppEvent> {
    stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => return Some((event, rx)),
                Err(RecvError::Lagged(skipped)) => {
                    debug!("event subscriber lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}

fn to_sse(event: &AppEvent) -> Result<Event, axum::Error> {
    Event::default().event(event.kind()).json_data(event)
}
