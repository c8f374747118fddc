//! Server-sent event stream of the run log.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures::stream::{self, Stream};
use loadctl_events::LogStream;

use crate::state::AppState;

/// GET /api/v1/logs/stream
///
/// One SSE event per accepted log entry, `{"message": ...}`, and a
/// `{"heartbeat": true}` event after each idle second. Each connection gets
/// its own broker subscription, dropped when the client disconnects.
pub async fn stream_logs(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let log = state.broker.stream();
    tracing::debug!(
        observers = state.broker.observer_count(),
        "Log stream observer connected"
    );
    Sse::new(events(log))
}

fn events(log: LogStream) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(log, |mut log| async move {
        let event = log.next_event().await?;
        let sse = Event::default().data(event.to_json().to_string());
        Some((Ok(sse), log))
    })
}
