use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, FromRow, Row};
use thiserror::Error;

//--------------------------------------    Coordinates    -----------------------------------------------------------

/// A WGS-84 latitude/longitude pair.
///
/// The fields are public for convenience, but use [`Coordinates::new`] when the values come from
/// an untrusted caller, since it enforces the valid ranges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Result<Self, ValidationError> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(ValidationError::new(format!("latitude {lat} is outside [-90, 90]")));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(ValidationError::new(format!("longitude {lng} is outside [-180, 180]")));
        }
        Ok(Self { lat, lng })
    }
}

impl Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ValidationError(String);

impl ValidationError {
    pub fn new<S: Into<String>>(msg: S) -> Self {
        Self(msg.into())
    }
}

//--------------------------------------        Role        ----------------------------------------------------------

/// The roles known to the tracking subsystem. Role assignment itself is owned by the external
/// identity service; we only interpret the role carried in the access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    PharmacyStaff,
    DeliveryAgent,
    Customer,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::PharmacyStaff => write!(f, "pharmacy_staff"),
            Role::DeliveryAgent => write!(f, "delivery_agent"),
            Role::Customer => write!(f, "customer"),
        }
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "pharmacy_staff" => Ok(Self::PharmacyStaff),
            "delivery_agent" => Ok(Self::DeliveryAgent),
            "customer" => Ok(Self::Customer),
            s => Err(ValidationError::new(format!("Invalid role: {s}"))),
        }
    }
}

//--------------------------------------    OrderStatus    -----------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// The order has been placed, but no delivery agent is on the road yet.
    Pending,
    /// A pharmacy has accepted the order and is preparing it.
    Accepted,
    /// A delivery agent is en route to the customer.
    OutForDelivery,
    /// The order was handed over to the customer. Terminal.
    Delivered,
    /// The order was cancelled. Terminal.
    Cancelled,
}

impl OrderStatus {
    /// Terminal statuses end the tracking lifecycle for the order.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "Pending"),
            OrderStatus::Accepted => write!(f, "Accepted"),
            OrderStatus::OutForDelivery => write!(f, "OutForDelivery"),
            OrderStatus::Delivered => write!(f, "Delivered"),
            OrderStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Accepted" => Ok(Self::Accepted),
            "OutForDelivery" => Ok(Self::OutForDelivery),
            "Delivered" => Ok(Self::Delivered),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ValidationError::new(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatus::Pending
        })
    }
}

//--------------------------------------   TrackingRecord   ----------------------------------------------------------

/// The single live-position row for an (order, delivery agent) pair.
///
/// Invariant: for a given `order_id`, at most one record has `is_active = true` at any instant.
/// Location updates mutate the active record in place rather than appending, so the record also
/// acts as the "current position" snapshot for the order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingRecord {
    pub id: i64,
    pub order_id: i64,
    pub delivery_agent_id: i64,
    pub position: Coordinates,
    pub heading: Option<f64>,
    pub speed_kmh: Option<f64>,
    pub accuracy_meters: Option<f64>,
    pub battery_percent: Option<f64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FromRow<'_, SqliteRow> for TrackingRecord {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let position = Coordinates { lat: row.try_get("lat")?, lng: row.try_get("lng")? };
        Ok(Self {
            id: row.try_get("id")?,
            order_id: row.try_get("order_id")?,
            delivery_agent_id: row.try_get("delivery_agent_id")?,
            position,
            heading: row.try_get("heading")?,
            speed_kmh: row.try_get("speed_kmh")?,
            accuracy_meters: row.try_get("accuracy_meters")?,
            battery_percent: row.try_get("battery_percent")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

//-------------------------------------- NewLocationUpdate  ----------------------------------------------------------

/// An incoming location sample for an order, as reported by a delivery agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLocationUpdate {
    pub order_id: i64,
    pub delivery_agent_id: i64,
    pub position: Coordinates,
    pub heading: Option<f64>,
    pub speed_kmh: Option<f64>,
    pub accuracy_meters: Option<f64>,
    pub battery_percent: Option<f64>,
}

impl NewLocationUpdate {
    pub fn new(order_id: i64, delivery_agent_id: i64, position: Coordinates) -> Self {
        Self {
            order_id,
            delivery_agent_id,
            position,
            heading: None,
            speed_kmh: None,
            accuracy_meters: None,
            battery_percent: None,
        }
    }

    /// Checks the optional telemetry fields against their documented ranges.
    pub fn validate(&self) -> Result<(), ValidationError> {
        Coordinates::new(self.position.lat, self.position.lng)?;
        if let Some(heading) = self.heading {
            if !(0.0..=360.0).contains(&heading) {
                return Err(ValidationError::new(format!("heading {heading} is outside [0, 360]")));
            }
        }
        if let Some(speed) = self.speed_kmh {
            if speed < 0.0 {
                return Err(ValidationError::new(format!("speed {speed} km/h is negative")));
            }
        }
        if let Some(accuracy) = self.accuracy_meters {
            if accuracy < 0.0 {
                return Err(ValidationError::new(format!("accuracy {accuracy} m is negative")));
            }
        }
        if let Some(battery) = self.battery_percent {
            if !(0.0..=100.0).contains(&battery) {
                return Err(ValidationError::new(format!("battery level {battery} is outside [0, 100]")));
            }
        }
        Ok(())
    }
}

//--------------------------------------    OrderSummary    ----------------------------------------------------------

/// The tracking subsystem's read-only view of an order, supplied by the external order store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: i64,
    pub customer_id: i64,
    pub pharmacy_id: i64,
    pub assigned_agent_id: Option<i64>,
    pub status: OrderStatus,
    /// Where the order must be delivered. Needed for ETA and route queries.
    pub destination: Option<Coordinates>,
    /// The dispatching pharmacy's location; the origin leg of the route summary.
    pub pharmacy_location: Option<Coordinates>,
}

impl FromRow<'_, SqliteRow> for OrderSummary {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let destination = coordinate_pair(row.try_get("destination_lat")?, row.try_get("destination_lng")?);
        let pharmacy_location = coordinate_pair(row.try_get("pharmacy_lat")?, row.try_get("pharmacy_lng")?);
        Ok(Self {
            id: row.try_get("id")?,
            customer_id: row.try_get("customer_id")?,
            pharmacy_id: row.try_get("pharmacy_id")?,
            assigned_agent_id: row.try_get("assigned_agent_id")?,
            status: row.try_get::<String, _>("status")?.into(),
            destination,
            pharmacy_location,
        })
    }
}

fn coordinate_pair(lat: Option<f64>, lng: Option<f64>) -> Option<Coordinates> {
    match (lat, lng) {
        (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
        _ => None,
    }
}

//--------------------------------------      NewOrder      ----------------------------------------------------------

/// Seed data for the order collaborator table. Orders are created by the ordering subsystem in
/// production; this type exists for tooling and tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub id: i64,
    pub customer_id: i64,
    pub pharmacy_id: i64,
    pub assigned_agent_id: Option<i64>,
    pub status: OrderStatus,
    pub destination: Option<Coordinates>,
    pub pharmacy_location: Option<Coordinates>,
}
