use crate::{
    db_types::{NewOrder, OrderStatus, OrderSummary},
    traits::TrackingStoreError,
};

/// The tracking subsystem's window onto the external order store.
///
/// Read-only, with one exception: the status transition that the subsystem itself triggers when a
/// delivery completes.
pub trait OrderDirectory {
    async fn fetch_order(&self, order_id: i64) -> Result<Option<OrderSummary>, TrackingStoreError>;

    /// Writes a new delivery status for the order. Returns the updated summary.
    async fn update_order_status(&self, order_id: i64, status: OrderStatus)
        -> Result<OrderSummary, TrackingStoreError>;

    /// Inserts an order row. Production orders come from the ordering subsystem; this exists for
    /// tooling and test setup.
    async fn insert_order(&self, order: NewOrder) -> Result<OrderSummary, TrackingStoreError>;
}
