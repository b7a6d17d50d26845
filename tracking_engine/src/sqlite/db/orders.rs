use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, OrderStatus, OrderSummary},
    traits::TrackingStoreError,
};

pub async fn fetch_order_by_id(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderSummary>, TrackingStoreError> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn update_order_status(
    order_id: i64,
    status: OrderStatus,
    conn: &mut SqliteConnection,
) -> Result<OrderSummary, TrackingStoreError> {
    let result: Option<OrderSummary> =
        sqlx::query_as("UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *")
            .bind(status.to_string())
            .bind(order_id)
            .fetch_optional(conn)
            .await?;
    result.ok_or(TrackingStoreError::OrderNotFound(order_id))
}

/// Inserts an order row. The ordering subsystem owns this table in production; the tracking
/// engine only writes here from tooling and test setup.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<OrderSummary, TrackingStoreError> {
    let order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                id,
                customer_id,
                pharmacy_id,
                assigned_agent_id,
                status,
                destination_lat,
                destination_lng,
                pharmacy_lat,
                pharmacy_lng
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *;
        "#,
    )
    .bind(order.id)
    .bind(order.customer_id)
    .bind(order.pharmacy_id)
    .bind(order.assigned_agent_id)
    .bind(order.status.to_string())
    .bind(order.destination.map(|c| c.lat))
    .bind(order.destination.map(|c| c.lng))
    .bind(order.pharmacy_location.map(|c| c.lat))
    .bind(order.pharmacy_location.map(|c| c.lng))
    .fetch_one(conn)
    .await?;
    Ok(order)
}
