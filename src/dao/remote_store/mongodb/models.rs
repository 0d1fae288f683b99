use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::dao::models::{EventEntity, EventSettings, EventStatus, StationEntity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoEventDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub code: String,
    pub owner_id: String,
    pub status: EventStatus,
    pub settings: EventSettings,
    pub created_at: SystemTime,
}

impl From<EventEntity> for MongoEventDocument {
    fn from(event: EventEntity) -> Self {
        Self {
            id: event.id,
            title: event.title,
            code: event.code,
            owner_id: event.owner_id,
            status: event.status,
            settings: event.settings,
            created_at: event.created_at,
        }
    }
}

impl From<MongoEventDocument> for EventEntity {
    fn from(doc: MongoEventDocument) -> Self {
        Self {
            id: doc.id,
            title: doc.title,
            code: doc.code,
            owner_id: doc.owner_id,
            status: doc.status,
            settings: doc.settings,
            created_at: doc.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoStationDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub event_id: String,
    pub name: String,
    pub registered_at: SystemTime,
}

impl From<StationEntity> for MongoStationDocument {
    fn from(station: StationEntity) -> Self {
        Self {
            id: station.id,
            event_id: station.event_id,
            name: station.name,
            registered_at: station.registered_at,
        }
    }
}

pub fn score_doc_id(event_id: &str, player_id: u32) -> String {
    format!("{event_id}::{player_id}")
}
