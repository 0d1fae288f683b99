use std::sync::Arc;

use futures::future::BoxFuture;
use mongodb::{
    Collection, Database,
    bson::{Document, doc},
    options::IndexOptions,
};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoEventDocument, MongoStationDocument, score_doc_id},
};
use crate::dao::{
    models::{EventEntity, StationEntity},
    remote_store::RemoteStore,
    storage::StorageResult,
};

const EVENT_COLLECTION_NAME: &str = "events";
const STATION_COLLECTION_NAME: &str = "stations";
const SCORE_COLLECTION_NAME: &str = "scores";

/// [`RemoteStore`] backed by MongoDB.
#[derive(Clone)]
pub struct MongoRemoteStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (_client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.database = database;
        Ok(())
    }
}

impl MongoRemoteStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (_client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let events = self.collection::<Document>(EVENT_COLLECTION_NAME).await;
        let index = mongodb::IndexModel::builder()
            .keys(doc! {"code": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("event_code_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();

        events
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: EVENT_COLLECTION_NAME,
                index: "code",
                source,
            })?;
        Ok(())
    }

    async fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<T>(name)
    }
}

impl RemoteStore for MongoRemoteStore {
    fn find_event_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<EventEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let events = store
                .collection::<MongoEventDocument>(EVENT_COLLECTION_NAME)
                .await;
            let found = events
                .find_one(doc! {"code": &code})
                .await
                .map_err(|source| MongoDaoError::FindEvent { code, source })?;
            Ok(found.map(Into::into))
        })
    }

    fn create_event(&self, event: EventEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let events = store
                .collection::<MongoEventDocument>(EVENT_COLLECTION_NAME)
                .await;
            let id = event.id.clone();
            events
                .insert_one(MongoEventDocument::from(event))
                .await
                .map_err(|source| MongoDaoError::SaveEvent { id, source })?;
            Ok(())
        })
    }

    fn register_station(&self, station: StationEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let stations = store
                .collection::<MongoStationDocument>(STATION_COLLECTION_NAME)
                .await;
            let id = station.id.clone();
            stations
                .insert_one(MongoStationDocument::from(station))
                .await
                .map_err(|source| MongoDaoError::SaveStation { id, source })?;
            Ok(())
        })
    }

    fn increment_player_score(
        &self,
        event_id: String,
        player_id: u32,
        delta: i64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let scores = store.collection::<Document>(SCORE_COLLECTION_NAME).await;
            scores
                .update_one(
                    doc! {"_id": score_doc_id(&event_id, player_id)},
                    doc! {
                        "$inc": {"score": delta},
                        "$setOnInsert": {"event_id": &event_id, "player_id": i64::from(player_id)},
                    },
                )
                .upsert(true)
                .await
                .map_err(|source| MongoDaoError::IncrementScore {
                    event_id,
                    player_id,
                    source,
                })?;
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
