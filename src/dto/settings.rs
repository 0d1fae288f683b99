//! Runtime settings and sensitivity payloads.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Partial update of the runtime settings.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SettingsUpdateRequest {
    /// Round length in seconds.
    #[validate(range(min = 1, max = 3600))]
    pub timer_duration_secs: Option<u32>,
    /// Software difficulty; the force threshold is `difficulty * 20`.
    #[validate(range(min = 1, max = 3276))]
    pub difficulty: Option<u16>,
    /// Minimum spacing between kicks on one channel, in milliseconds.
    #[validate(range(max = 2000))]
    pub debounce_ms: Option<u64>,
    /// Advance to the next group when the clock expires.
    pub auto_advance: Option<bool>,
}

/// New display name for a player.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RenamePlayerRequest {
    /// Name shown on the scoreboard.
    #[validate(length(min = 1, max = 40))]
    pub name: String,
}

/// Hardware sensitivity to send to the controller.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ForceThresholdRequest {
    /// Raw sensitivity byte understood by the controller firmware.
    pub threshold: u8,
}

/// Result of a sensitivity change.
#[derive(Debug, Serialize, ToSchema)]
pub struct ForceThresholdResponse {
    /// Threshold now stored in the match state.
    pub threshold: u8,
    /// Whether the control packet reached a connected controller.
    pub sent: bool,
}
