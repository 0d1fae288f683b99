use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dao::models::{EventEntity, EventSettings, EventStatus, StationEntity};

pub const EVENT_PREFIX: &str = "event::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchEventDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub title: String,
    pub code: String,
    pub owner_id: String,
    pub status: EventStatus,
    pub settings: EventSettings,
    pub created_at: SystemTime,
}

impl CouchEventDocument {
    pub fn from_entity(event: EventEntity) -> Self {
        Self {
            id: event_doc_id(&event.id),
            rev: None,
            title: event.title,
            code: event.code,
            owner_id: event.owner_id,
            status: event.status,
            settings: event.settings,
            created_at: event.created_at,
        }
    }

    pub fn into_entity(self) -> EventEntity {
        let id = self
            .id
            .strip_prefix(EVENT_PREFIX)
            .unwrap_or(&self.id)
            .to_owned();
        EventEntity {
            id,
            title: self.title,
            code: self.code,
            owner_id: self.owner_id,
            status: self.status,
            settings: self.settings,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchStationDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub event_id: String,
    pub name: String,
    pub registered_at: SystemTime,
}

impl From<StationEntity> for CouchStationDocument {
    fn from(station: StationEntity) -> Self {
        Self {
            id: station_doc_id(&station.id),
            event_id: station.event_id,
            name: station.name,
            registered_at: station.registered_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchScoreDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub event_id: String,
    pub player_id: u32,
    pub score: i64,
}

pub fn event_doc_id(id: &str) -> String {
    format!("{EVENT_PREFIX}{id}")
}

pub fn station_doc_id(id: &str) -> String {
    format!("station::{id}")
}

pub fn score_doc_id(event_id: &str, player_id: u32) -> String {
    format!("score::{event_id}::{player_id}")
}
