use thiserror::Error;

use crate::{access::AccessError, db_types::ValidationError, traits::TrackingStoreError};

#[derive(Debug, Clone, Error)]
pub enum TrackingApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order {0} was not found")]
    OrderNotFound(i64),
    #[error("Tracking record {0} was not found")]
    RecordNotFound(i64),
    #[error(transparent)]
    AccessDenied(#[from] AccessError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Order {order_id} is {status} and its status may not change to {requested}")]
    StatusChangeForbidden { order_id: i64, status: String, requested: String },
    #[error("Order {order_id} is {status} and no longer accepts location updates")]
    TrackingClosed { order_id: i64, status: String },
}

impl From<TrackingStoreError> for TrackingApiError {
    fn from(e: TrackingStoreError) -> Self {
        match e {
            TrackingStoreError::DatabaseError(e) => Self::DatabaseError(e),
            TrackingStoreError::RecordNotFound(id) => Self::RecordNotFound(id),
            TrackingStoreError::OrderNotFound(id) => Self::OrderNotFound(id),
        }
    }
}
