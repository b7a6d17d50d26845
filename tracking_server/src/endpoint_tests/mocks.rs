use chrono::{DateTime, Utc};
use mockall::mock;
use tracking_engine::{
    access::StatisticsScope,
    db_types::{NewLocationUpdate, NewOrder, OrderStatus, OrderSummary, TrackingRecord},
    tracking_api::{Pagination, TrackingQueryFilter, TrackingStatistics},
    traits::{OrderDirectory, TrackingStore, TrackingStoreError},
};

mock! {
    pub TrackingBackend {}
    impl TrackingStore for TrackingBackend {
        async fn upsert_location(&self, update: NewLocationUpdate) -> Result<TrackingRecord, TrackingStoreError>;
        async fn fetch_latest_location(&self, order_id: i64) -> Result<Option<TrackingRecord>, TrackingStoreError>;
        async fn end_tracking(&self, order_id: i64) -> Result<(u64, DateTime<Utc>), TrackingStoreError>;
        async fn fetch_history(&self, order_id: i64) -> Result<Vec<TrackingRecord>, TrackingStoreError>;
        async fn fetch_record(&self, id: i64) -> Result<Option<TrackingRecord>, TrackingStoreError>;
        async fn search_records(&self, filter: TrackingQueryFilter, pagination: Pagination) -> Result<Vec<TrackingRecord>, TrackingStoreError>;
        async fn fetch_active_records(&self, pharmacy_id: Option<i64>) -> Result<Vec<TrackingRecord>, TrackingStoreError>;
        async fn fetch_statistics(&self, scope: StatisticsScope) -> Result<TrackingStatistics, TrackingStoreError>;
    }
    impl OrderDirectory for TrackingBackend {
        async fn fetch_order(&self, order_id: i64) -> Result<Option<OrderSummary>, TrackingStoreError>;
        async fn update_order_status(&self, order_id: i64, status: OrderStatus) -> Result<OrderSummary, TrackingStoreError>;
        async fn insert_order(&self, order: NewOrder) -> Result<OrderSummary, TrackingStoreError>;
    }
}
