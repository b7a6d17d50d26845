use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracking_engine::{
    db_types::{Coordinates, NewLocationUpdate, OrderStatus, ValidationError},
    tracking_api::{Pagination, TrackingQueryFilter},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// The body of `POST /api/tracking/location`. The submitting agent's id comes from the access
/// token, never from the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSubmission {
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

impl LocationSubmission {
    pub fn into_new_update(self, agent_id: i64) -> Result<NewLocationUpdate, ValidationError> {
        let position = Coordinates::new(self.lat, self.lng)?;
        Ok(NewLocationUpdate {
            order_id: self.order_id,
            delivery_agent_id: agent_id,
            position,
            heading: self.heading,
            speed_kmh: self.speed,
            accuracy_meters: self.accuracy,
            battery_percent: self.battery_level,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeRequest {
    pub status: OrderStatus,
}

/// Query parameters for `GET /api/tracking`. Statuses arrive comma-separated
/// (`?status=Accepted,OutForDelivery`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingListParams {
    pub order_id: Option<i64>,
    pub delivery_agent_id: Option<i64>,
    pub pharmacy_id: Option<i64>,
    pub active: Option<bool>,
    pub status: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

impl TrackingListParams {
    pub fn into_parts(self) -> Result<(TrackingQueryFilter, Pagination), ValidationError> {
        let status = self
            .status
            .as_deref()
            .map(|csv| csv.split(',').map(|s| s.trim().parse()).collect::<Result<Vec<OrderStatus>, _>>())
            .transpose()?;
        let filter = TrackingQueryFilter {
            order_id: self.order_id,
            delivery_agent_id: self.delivery_agent_id,
            pharmacy_id: self.pharmacy_id,
            active: self.active,
            status,
            since: self.since,
            until: self.until,
        };
        Ok((filter, Pagination::new(self.offset, self.limit)))
    }
}
