//! The streaming wire protocol.
//!
//! Every frame is a JSON object of the form `{"event": <name>, "data": <payload>}`. Client-to-
//! server operations additionally receive an `ack` frame reporting whether the operation was
//! accepted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracking_engine::db_types::{Coordinates, TrackingRecord};

//--------------------------------------    Client events    ---------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    SubscribeToOrder(OrderRef),
    UnsubscribeFromOrder(OrderRef),
    UpdateLocation(LocationSample),
    EndTracking(OrderRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRef {
    pub order_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    pub order_id: i64,
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, rename = "battery_level", skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<f64>,
}

//--------------------------------------    Server events    ---------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    Ack(Ack),
    LocationUpdated(LocationUpdated),
    EtaUpdated(EtaUpdated),
    TrackingEnded(TrackingEnded),
    TrackingInterrupted(TrackingInterrupted),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Ack {
    pub fn ok() -> Self {
        Self { ok: true, reason: None }
    }

    pub fn fail<S: Into<String>>(reason: S) -> Self {
        Self { ok: false, reason: Some(reason.into()) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdated {
    pub order_id: i64,
    pub agent_id: i64,
    pub position: Coordinates,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

impl From<&TrackingRecord> for LocationUpdated {
    fn from(record: &TrackingRecord) -> Self {
        Self {
            order_id: record.order_id,
            agent_id: record.delivery_agent_id,
            position: record.position,
            heading: record.heading,
            speed: record.speed_kmh,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtaUpdated {
    pub order_id: i64,
    pub eta_timestamp: DateTime<Utc>,
    pub distance_km: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEnded {
    pub order_id: i64,
    pub ended_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingInterrupted {
    pub order_id: i64,
    pub agent_id: i64,
    pub message: String,
}
