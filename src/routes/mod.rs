//! HTTP routes.

use axum::Router;

use crate::state::SharedState;

pub mod docs;
pub mod health;
pub mod match_control;
pub mod sse;
pub mod station;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(match_control::router())
        .merge(station::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
