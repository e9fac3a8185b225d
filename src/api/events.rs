use axum::extract::State;
use axum::response::sse::{Event, KeepAlive};
use axum::response::Sse;

use crate::app::AppState;

/// `GET /v1/events` (§4.J, §4.N′): a live Server-Sent-Events stream of every
/// Event raised by the trend tick, opening with a `connected` frame.
pub(crate) async fn stream(
    State(state): State<AppState>,
) -> Sse<impl futures::Stream<Item = Result<Event, std::convert::Infallible>>> {
    Sse::new(state.broadcaster().subscribe_stream()).keep_alive(KeepAlive::default())
}
