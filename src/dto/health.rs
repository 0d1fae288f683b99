//! Health check payload.

use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "offline").
    pub status: String,
}

impl HealthResponse {
    /// The remote store is reachable.
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }

    /// Scores are being buffered locally.
    pub fn offline() -> Self {
        Self {
            status: "offline".to_string(),
        }
    }
}
