use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    access::StatisticsScope,
    db_types::NewLocationUpdate,
    db_types::TrackingRecord,
    tracking_api::{Pagination, TrackingQueryFilter, TrackingStatistics},
};

#[derive(Debug, Clone, Error)]
pub enum TrackingStoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Tracking record {0} does not exist")]
    RecordNotFound(i64),
    #[error("Order {0} does not exist")]
    OrderNotFound(i64),
}

impl From<sqlx::Error> for TrackingStoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

/// Persistence contract for tracking records.
///
/// Implementations must uphold the single-active-record invariant: `upsert_location` mutates the
/// order's active record in place when one exists and only creates a new row otherwise.
pub trait TrackingStore {
    /// Create or update the active tracking record for `update.order_id`.
    ///
    /// The lookup is deliberately *not* filtered by agent id. If the order was reassigned and the
    /// active record belongs to a different agent, that record is taken over rather than letting
    /// records proliferate.
    async fn upsert_location(&self, update: NewLocationUpdate) -> Result<TrackingRecord, TrackingStoreError>;

    /// The most recently updated active record for the order, if any.
    async fn fetch_latest_location(&self, order_id: i64) -> Result<Option<TrackingRecord>, TrackingStoreError>;

    /// Deactivates every active record for the order. Idempotent; returns the number of rows
    /// touched together with the deactivation time.
    async fn end_tracking(&self, order_id: i64) -> Result<(u64, DateTime<Utc>), TrackingStoreError>;

    /// All records for the order, active and inactive, ordered by `updated_at` ascending.
    ///
    /// Because `upsert_location` overwrites in place, intermediate positions are not retained and
    /// this effectively degenerates to the latest snapshot per activity period. A true history
    /// requires an append-only event table.
    async fn fetch_history(&self, order_id: i64) -> Result<Vec<TrackingRecord>, TrackingStoreError>;

    async fn fetch_record(&self, id: i64) -> Result<Option<TrackingRecord>, TrackingStoreError>;

    /// Records matching the filter, newest first.
    async fn search_records(
        &self,
        filter: TrackingQueryFilter,
        pagination: Pagination,
    ) -> Result<Vec<TrackingRecord>, TrackingStoreError>;

    /// All currently active records, optionally limited to a pharmacy's orders.
    async fn fetch_active_records(&self, pharmacy_id: Option<i64>) -> Result<Vec<TrackingRecord>, TrackingStoreError>;

    /// Aggregate counts of active records by order status, plus today's update count.
    async fn fetch_statistics(&self, scope: StatisticsScope) -> Result<TrackingStatistics, TrackingStoreError>;
}
