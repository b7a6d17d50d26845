use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{Coordinates, OrderStatus};

//--------------------------------------  TrackingQueryFilter  -------------------------------------------------------

/// Filter criteria for tracking record searches. Every field is optional; set fields are ANDed
/// together and bound as query parameters, never interpolated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TrackingQueryFilter {
    pub order_id: Option<i64>,
    pub delivery_agent_id: Option<i64>,
    pub pharmacy_id: Option<i64>,
    pub active: Option<bool>,
    pub status: Option<Vec<OrderStatus>>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TrackingQueryFilter {
    pub fn with_order_id(mut self, order_id: i64) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_agent(mut self, agent_id: i64) -> Self {
        self.delivery_agent_id = Some(agent_id);
        self
    }

    pub fn with_pharmacy(mut self, pharmacy_id: i64) -> Self {
        self.pharmacy_id = Some(pharmacy_id);
        self
    }

    pub fn active_only(mut self) -> Self {
        self.active = Some(true);
        self
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.order_id.is_none()
            && self.delivery_agent_id.is_none()
            && self.pharmacy_id.is_none()
            && self.active.is_none()
            && self.status.is_none()
            && self.since.is_none()
            && self.until.is_none()
    }
}

impl Display for TrackingQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "No filters.");
        }
        if let Some(order_id) = self.order_id {
            write!(f, "order_id: {order_id}. ")?;
        }
        if let Some(agent_id) = self.delivery_agent_id {
            write!(f, "agent_id: {agent_id}. ")?;
        }
        if let Some(pharmacy_id) = self.pharmacy_id {
            write!(f, "pharmacy_id: {pharmacy_id}. ")?;
        }
        if let Some(active) = self.active {
            write!(f, "active: {active}. ")?;
        }
        if let Some(statuses) = &self.status {
            let statuses = statuses.iter().map(|s| s.to_string()).collect::<Vec<String>>().join(",");
            write!(f, "statuses: [{statuses}]. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until {until}. ")?;
        }
        Ok(())
    }
}

//--------------------------------------     Pagination     ----------------------------------------------------------

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 500;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub offset: i64,
    pub limit: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { offset: 0, limit: DEFAULT_PAGE_SIZE }
    }
}

impl Pagination {
    pub fn new(offset: Option<i64>, limit: Option<i64>) -> Self {
        let offset = offset.unwrap_or(0).max(0);
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        Self { offset, limit }
    }
}

//--------------------------------------     EtaOutcome     ----------------------------------------------------------

/// The result of an ETA computation. Missing inputs are an expected condition, not an error, so
/// they are encoded here rather than raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum EtaOutcome {
    #[serde(rename_all = "camelCase")]
    Available { eta_timestamp: DateTime<Utc>, distance_km: f64, effective_speed_kmh: f64 },
    #[serde(rename_all = "camelCase")]
    NoData { reason: NoEtaReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoEtaReason {
    /// The order has no destination coordinates on file.
    NoDestination,
    /// No active tracking record exists for the order.
    NoCurrentPosition,
}

impl Display for NoEtaReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoEtaReason::NoDestination => write!(f, "the order has no destination coordinates"),
            NoEtaReason::NoCurrentPosition => write!(f, "no current position is being tracked for the order"),
        }
    }
}

//--------------------------------------    RouteSummary    ----------------------------------------------------------

/// The three points of interest for a delivery, plus the straight-line remainder. No path routing
/// is computed here; clients that want turn-by-turn directions feed these points to a routing
/// service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub order_id: i64,
    /// The dispatching pharmacy's location.
    pub origin: Option<Coordinates>,
    pub destination: Option<Coordinates>,
    /// The agent's latest tracked position.
    pub current_position: Option<Coordinates>,
    /// Straight-line distance from the current position to the destination, when both are known.
    pub remaining_km: Option<f64>,
}

//--------------------------------------  TrackingStatistics  --------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    pub status: OrderStatus,
    pub total: i64,
}

/// Aggregates over active tracking records, scoped by the caller's authorization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingStatistics {
    pub total_by_status: Vec<StatusCount>,
    /// Number of tracking records that received an update today (UTC).
    pub today_count: i64,
}
