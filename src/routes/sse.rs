//! Live station stream.

use std::convert::Infallible;

use axum::{
    Router,
    extract::State,
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{services::sse_service, state::SharedState};

/// Subscribe to match, cue, kick, device and connectivity events.
#[utoipa::path(
    get,
    path = "/sse",
    tag = "sse",
    responses((status = 200, description = "Station event stream", content_type = "text/event-stream", body = String))
)]
/// Stream match, kick, cue, device and connectivity events to the presentation layer.
pub async fn station_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE connection");
    sse_service::to_sse_stream(state)
}

/// Configure the SSE endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse", get(station_stream))
}
