//! Operations behind the HTTP routes and the background tasks.

/// Countdown clock task driving match ticks.
pub mod clock;
/// Remote store supervision and flush scheduling.
pub mod connectivity;
/// Serial link supervision and kick ingestion.
pub mod device_service;
/// OpenAPI document.
pub mod documentation;
/// Event creation and station registration.
pub mod event_service;
/// Health reporting.
pub mod health_service;
/// Match lifecycle operations.
pub mod match_service;
/// Station event to SSE payload mapping.
pub mod sse_events;
/// SSE stream plumbing.
pub mod sse_service;
