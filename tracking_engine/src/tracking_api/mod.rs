//! The public API of the tracking domain service.
//!
//! [`TrackingApi`] wraps a storage backend and layers validation, the authorization policy and
//! the ETA arithmetic on top of it. It has no transport awareness; both the connection gateway
//! and the synchronous query façade call through it.

mod api;
mod errors;
mod objects;

pub use api::{StatusChangeOutcome, TrackingApi};
pub use errors::TrackingApiError;
pub use objects::{
    EtaOutcome,
    NoEtaReason,
    Pagination,
    RouteSummary,
    StatusCount,
    TrackingQueryFilter,
    TrackingStatistics,
};
