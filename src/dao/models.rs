use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Default round length for new events, in seconds.
pub const DEFAULT_EVENT_TIMER_SECS: u32 = 60;
/// Default difficulty for new events.
pub const DEFAULT_EVENT_DIFFICULTY: u16 = 10;

/// A competition that stations join and report scores to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventEntity {
    /// Stable identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Short join code typed at the stations.
    pub code: String,
    /// Operator who created the event.
    pub owner_id: String,
    /// Lifecycle of the event.
    pub status: EventStatus,
    /// Defaults applied by joining stations.
    pub settings: EventSettings,
    /// Creation time.
    pub created_at: SystemTime,
}

/// Lifecycle of an event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    /// Created but not started.
    Scheduled,
    /// Running; stations report scores.
    Active,
    /// Finished.
    Completed,
}

/// Match defaults carried by an event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct EventSettings {
    /// Round length in seconds.
    pub timer_duration_secs: u32,
    /// Software difficulty.
    pub difficulty: u16,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            timer_duration_secs: DEFAULT_EVENT_TIMER_SECS,
            difficulty: DEFAULT_EVENT_DIFFICULTY,
        }
    }
}

/// A kiosk registered against an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StationEntity {
    /// Stable identifier.
    pub id: String,
    /// Event the station reports to.
    pub event_id: String,
    /// Operator-chosen station name.
    pub name: String,
    /// Registration time.
    pub registered_at: SystemTime,
}
