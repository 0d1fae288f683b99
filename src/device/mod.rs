//! Kick-pad controller input: wire formats, framing, kick detection and serial transport.

/// Threshold and debounce stage.
pub mod detector;
/// Byte-stream framer.
pub mod framer;
/// Sensor and control packet codecs.
pub mod packet;
/// Serial port transport.
pub mod serial;

use serde::Serialize;
use utoipa::ToSchema;

/// Connection state of the controller as shown to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum DeviceStatus {
    /// No port is open.
    Disconnected,
    /// Opening the configured port.
    Connecting,
    /// Reading packets.
    Connected,
    /// The last attempt failed; a retry is scheduled.
    Failed(String),
}
