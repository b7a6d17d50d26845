use chrono::{DateTime, Utc};
use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    access::StatisticsScope,
    db_types::{NewLocationUpdate, TrackingRecord},
    tracking_api::{Pagination, StatusCount, TrackingQueryFilter, TrackingStatistics},
    traits::TrackingStoreError,
};

/// Creates or updates the single active tracking record for the order.
///
/// The write is a single upsert against the partial unique index on
/// `(order_id) WHERE is_active = 1`, so the single-active-record invariant holds even under
/// concurrent first updates. The conflict target is the active row regardless of agent: if the
/// order was reassigned, the existing record is taken over (agent id and telemetry overwritten)
/// rather than a second row appearing. `created_at` marks the start of the activity period and
/// is left untouched on update.
pub async fn upsert_location(
    update: NewLocationUpdate,
    conn: &mut SqliteConnection,
) -> Result<TrackingRecord, TrackingStoreError> {
    let now = Utc::now();
    let record = sqlx::query_as(
        r#"
        INSERT INTO tracking_record (
            order_id,
            delivery_agent_id,
            lat,
            lng,
            heading,
            speed_kmh,
            accuracy_meters,
            battery_percent,
            is_active,
            created_at,
            updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 1, $9, $9)
        ON CONFLICT (order_id) WHERE is_active = 1 DO UPDATE SET
            delivery_agent_id = excluded.delivery_agent_id,
            lat = excluded.lat,
            lng = excluded.lng,
            heading = excluded.heading,
            speed_kmh = excluded.speed_kmh,
            accuracy_meters = excluded.accuracy_meters,
            battery_percent = excluded.battery_percent,
            updated_at = excluded.updated_at
        RETURNING *;
    "#,
    )
    .bind(update.order_id)
    .bind(update.delivery_agent_id)
    .bind(update.position.lat)
    .bind(update.position.lng)
    .bind(update.heading)
    .bind(update.speed_kmh)
    .bind(update.accuracy_meters)
    .bind(update.battery_percent)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(record)
}

/// The most recent active record for the order, if any.
pub async fn fetch_latest_location(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<TrackingRecord>, TrackingStoreError> {
    let record = sqlx::query_as(
        "SELECT * FROM tracking_record WHERE order_id = $1 AND is_active = 1 ORDER BY updated_at DESC LIMIT 1",
    )
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(record)
}

/// Deactivates every active record for the order. Returns the number of rows touched; zero is
/// fine (the operation is idempotent).
pub async fn deactivate_records(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<(u64, DateTime<Utc>), TrackingStoreError> {
    let now = Utc::now();
    let result = sqlx::query("UPDATE tracking_record SET is_active = 0, updated_at = $1 WHERE order_id = $2 AND is_active = 1")
        .bind(now)
        .bind(order_id)
        .execute(conn)
        .await?;
    Ok((result.rows_affected(), now))
}

/// All records for the order, active and inactive, oldest first.
pub async fn fetch_history(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<TrackingRecord>, TrackingStoreError> {
    let records = sqlx::query_as("SELECT * FROM tracking_record WHERE order_id = $1 ORDER BY updated_at ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(records)
}

pub async fn fetch_record(id: i64, conn: &mut SqliteConnection) -> Result<Option<TrackingRecord>, TrackingStoreError> {
    let record = sqlx::query_as("SELECT * FROM tracking_record WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(record)
}

/// Fetches tracking records according to the criteria in the filter, newest first.
///
/// Every caller-supplied value is bound as a parameter.
pub async fn search_records(
    filter: TrackingQueryFilter,
    pagination: Pagination,
    conn: &mut SqliteConnection,
) -> Result<Vec<TrackingRecord>, TrackingStoreError> {
    let mut builder = QueryBuilder::new(
        r#"
    SELECT t.* FROM tracking_record t JOIN orders o ON o.id = t.order_id
    "#,
    );
    if !filter.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_id) = filter.order_id {
        where_clause.push("t.order_id = ");
        where_clause.push_bind_unseparated(order_id);
    }
    if let Some(agent_id) = filter.delivery_agent_id {
        where_clause.push("t.delivery_agent_id = ");
        where_clause.push_bind_unseparated(agent_id);
    }
    if let Some(pharmacy_id) = filter.pharmacy_id {
        where_clause.push("o.pharmacy_id = ");
        where_clause.push_bind_unseparated(pharmacy_id);
    }
    if let Some(active) = filter.active {
        where_clause.push("t.is_active = ");
        where_clause.push_bind_unseparated(active);
    }
    if let Some(statuses) = &filter.status {
        if !statuses.is_empty() {
            where_clause.push("o.status IN (");
            let mut first = true;
            for status in statuses {
                if !first {
                    where_clause.push_unseparated(", ");
                }
                where_clause.push_bind_unseparated(status.to_string());
                first = false;
            }
            where_clause.push_unseparated(")");
        }
    }
    if let Some(since) = filter.since {
        where_clause.push("t.updated_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = filter.until {
        where_clause.push("t.updated_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY t.updated_at DESC LIMIT ");
    builder.push_bind(pagination.limit);
    builder.push(" OFFSET ");
    builder.push_bind(pagination.offset);

    trace!("📍️ Executing query: {}", builder.sql());
    let query = builder.build_query_as::<TrackingRecord>();
    let records = query.fetch_all(conn).await?;
    trace!("📍️ Result of search_records: {:?}", records.len());
    Ok(records)
}

/// All currently active records, optionally limited to one pharmacy's orders.
pub async fn fetch_active_records(
    pharmacy_id: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<Vec<TrackingRecord>, TrackingStoreError> {
    let mut builder =
        QueryBuilder::new("SELECT t.* FROM tracking_record t JOIN orders o ON o.id = t.order_id WHERE t.is_active = 1");
    if let Some(pharmacy_id) = pharmacy_id {
        builder.push(" AND o.pharmacy_id = ");
        builder.push_bind(pharmacy_id);
    }
    builder.push(" ORDER BY t.updated_at DESC");
    let records = builder.build_query_as::<TrackingRecord>().fetch_all(conn).await?;
    Ok(records)
}

/// Counts of active tracking records grouped by the joined order status, plus the number of
/// active records updated today (UTC), restricted to the given scope.
pub async fn fetch_statistics(
    scope: StatisticsScope,
    conn: &mut SqliteConnection,
) -> Result<TrackingStatistics, TrackingStoreError> {
    let pharmacy_id = match scope {
        StatisticsScope::Global => None,
        StatisticsScope::Pharmacy(id) => Some(id),
    };

    let mut builder = QueryBuilder::new(
        r#"
        SELECT o.status AS status, COUNT(*) AS total
        FROM tracking_record t JOIN orders o ON o.id = t.order_id
        WHERE t.is_active = 1
    "#,
    );
    if let Some(pharmacy_id) = pharmacy_id {
        builder.push(" AND o.pharmacy_id = ");
        builder.push_bind(pharmacy_id);
    }
    builder.push(" GROUP BY o.status ORDER BY o.status");
    let rows: Vec<(String, i64)> = builder.build_query_as().fetch_all(&mut *conn).await?;
    let total_by_status =
        rows.into_iter().map(|(status, total)| StatusCount { status: status.into(), total }).collect();

    let mut builder = QueryBuilder::new(
        r#"
        SELECT COUNT(*) FROM tracking_record t JOIN orders o ON o.id = t.order_id
        WHERE t.is_active = 1 AND date(t.updated_at) = date('now')
    "#,
    );
    if let Some(pharmacy_id) = pharmacy_id {
        builder.push(" AND o.pharmacy_id = ");
        builder.push_bind(pharmacy_id);
    }
    let (today_count,): (i64,) = builder.build_query_as().fetch_one(conn).await?;

    Ok(TrackingStatistics { total_by_status, today_count })
}
