use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether scores reach the remote store, pinging it when attached.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.queue().remote().await {
        Some(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "remote store health check failed");
            }
        }
        None => warn!("remote store unavailable (offline mode)"),
    }

    if state.queue().is_online() {
        HealthResponse::ok()
    } else {
        HealthResponse::offline()
    }
}
