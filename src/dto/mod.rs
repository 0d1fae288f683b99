//! Request and response payloads of the HTTP and SSE surface.

use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod device;
pub mod health;
pub mod match_state;
pub mod settings;
pub mod sse;
pub mod station;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
