//! Controller operator payloads.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::device::DeviceStatus;

/// Simulated strike; unset fields are picked by the station.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
#[serde(default)]
pub struct TestHitRequest {
    /// Channel 1-4; random when omitted.
    #[validate(range(min = 1, max = 4))]
    pub channel: Option<u8>,
    /// Sensor force; defaults to just above the current threshold.
    pub force: Option<u16>,
}

/// What the simulated strike did.
#[derive(Debug, Serialize, ToSchema)]
pub struct TestHitResponse {
    /// Channel the strike was injected on.
    pub channel: u8,
    /// Force carried by the injected packet.
    pub force: u16,
    /// Whether the detector registered a kick.
    pub accepted: bool,
}

/// Controller link state after an operator action.
#[derive(Debug, Serialize, ToSchema)]
pub struct DeviceControlResponse {
    /// Whether the station is allowed to hold the port open.
    pub enabled: bool,
    /// Link status at the time of the response.
    pub status: DeviceStatus,
}
