//! Durable score-delta log and its synchronisation to the remote store.

/// SQLite-backed pending delta log.
pub mod local_store;
/// Single-flight flushing queue.
pub mod queue;
/// Delta records, keys and aggregation.
pub mod record;
