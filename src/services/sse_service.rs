use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::{
    dto::sse::{Handshake, ServerEvent},
    services::sse_events::{self, EVENT_HANDSHAKE},
    state::SharedState,
};

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}

/// Build the handshake sent to a freshly connected client.
pub async fn handshake(state: &SharedState) -> Option<ServerEvent> {
    let payload = Handshake {
        match_state: state.snapshot().await.into(),
        device: state.device_status(),
        online: state.queue().is_online(),
    };
    ServerEvent::json(EVENT_HANDSHAKE.to_string(), &payload).ok()
}

/// Stream station events to one client, starting with a handshake snapshot.
pub fn to_sse_stream(state: SharedState) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // subscribe before building the handshake so nothing falls between the two
    let mut receiver = state.events().subscribe();
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        if let Some(handshake) = handshake(&state).await {
            if tx.send(Ok(to_event(handshake))).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(station_event) => {
                            let Some(payload) = sse_events::to_server_event(station_event) else {
                                continue;
                            };
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(skipped, "sse client lagging; events dropped");
                            continue;
                        }
                    }
                }
            }
        }

        info!("SSE stream disconnected");
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
