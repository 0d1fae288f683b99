//! Remote persistence: entities, the backend-neutral store trait and its implementations.

/// Database model definitions.
pub mod models;
/// Remote store backends (memory, CouchDB, MongoDB).
pub mod remote_store;
/// Storage error types shared by every backend.
pub mod storage;
