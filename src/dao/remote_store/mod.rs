//! Remote leaderboard backends.

#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{EventEntity, StationEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

/// Abstraction over the cloud store holding events, stations and the leaderboard.
pub trait RemoteStore: Send + Sync {
    /// Look an event up by its join code.
    fn find_event_by_code(&self, code: String)
    -> BoxFuture<'static, StorageResult<Option<EventEntity>>>;
    /// Persist a new event.
    fn create_event(&self, event: EventEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Persist a station registration.
    fn register_station(&self, station: StationEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Add `delta` to the player's score, creating the player when missing.
    fn increment_player_score(
        &self,
        event_id: String,
        player_id: u32,
        delta: i64,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Cheap round-trip proving the backend is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the underlying connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
