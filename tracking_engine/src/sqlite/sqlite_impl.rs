//! `SqliteDatabase` is the concrete storage backend for the tracking engine.
//!
//! It implements the [`TrackingStore`] and [`OrderDirectory`] traits over a SQLite pool.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;

use super::db::{new_pool, orders, tracking};
use crate::{
    access::StatisticsScope,
    db_types::{NewLocationUpdate, NewOrder, OrderStatus, OrderSummary, TrackingRecord},
    tracking_api::{Pagination, TrackingQueryFilter, TrackingStatistics},
    traits::{OrderDirectory, TrackingStore, TrackingStoreError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new connection pool against the given URL and returns the database handle.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, TrackingStoreError> {
        let pool = new_pool(url, max_connections).await?;
        debug!("🗃️ Connection pool established for {url}");
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Applies any outstanding schema migrations.
    pub async fn run_migrations(&self) -> Result<(), TrackingStoreError> {
        sqlx::migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| TrackingStoreError::DatabaseError(e.to_string()))?;
        info!("🗃️ Migrations complete");
        Ok(())
    }
}

impl TrackingStore for SqliteDatabase {
    async fn upsert_location(&self, update: NewLocationUpdate) -> Result<TrackingRecord, TrackingStoreError> {
        let mut conn = self.pool.acquire().await?;
        tracking::upsert_location(update, &mut conn).await
    }

    async fn fetch_latest_location(&self, order_id: i64) -> Result<Option<TrackingRecord>, TrackingStoreError> {
        let mut conn = self.pool.acquire().await?;
        tracking::fetch_latest_location(order_id, &mut conn).await
    }

    async fn end_tracking(&self, order_id: i64) -> Result<(u64, DateTime<Utc>), TrackingStoreError> {
        let mut conn = self.pool.acquire().await?;
        tracking::deactivate_records(order_id, &mut conn).await
    }

    async fn fetch_history(&self, order_id: i64) -> Result<Vec<TrackingRecord>, TrackingStoreError> {
        let mut conn = self.pool.acquire().await?;
        tracking::fetch_history(order_id, &mut conn).await
    }

    async fn fetch_record(&self, id: i64) -> Result<Option<TrackingRecord>, TrackingStoreError> {
        let mut conn = self.pool.acquire().await?;
        tracking::fetch_record(id, &mut conn).await
    }

    async fn search_records(
        &self,
        filter: TrackingQueryFilter,
        pagination: Pagination,
    ) -> Result<Vec<TrackingRecord>, TrackingStoreError> {
        let mut conn = self.pool.acquire().await?;
        tracking::search_records(filter, pagination, &mut conn).await
    }

    async fn fetch_active_records(&self, pharmacy_id: Option<i64>) -> Result<Vec<TrackingRecord>, TrackingStoreError> {
        let mut conn = self.pool.acquire().await?;
        tracking::fetch_active_records(pharmacy_id, &mut conn).await
    }

    async fn fetch_statistics(&self, scope: StatisticsScope) -> Result<TrackingStatistics, TrackingStoreError> {
        let mut conn = self.pool.acquire().await?;
        tracking::fetch_statistics(scope, &mut conn).await
    }
}

impl OrderDirectory for SqliteDatabase {
    async fn fetch_order(&self, order_id: i64) -> Result<Option<OrderSummary>, TrackingStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_id(order_id, &mut conn).await
    }

    async fn update_order_status(
        &self,
        order_id: i64,
        status: OrderStatus,
    ) -> Result<OrderSummary, TrackingStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::update_order_status(order_id, status, &mut conn).await
    }

    async fn insert_order(&self, order: NewOrder) -> Result<OrderSummary, TrackingStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::insert_order(order, &mut conn).await
    }
}
