//! Tracking Engine
//!
//! The domain service behind the real-time delivery-location-tracking subsystem. It owns
//! persistence of tracking records, the great-circle/ETA arithmetic and the role-based
//! authorization policy, and has no transport awareness: both the connection gateway and the
//! synchronous query façade in `tracking_server` drive it through [`TrackingApi`].
//!
//! The library is divided into two main sections:
//! 1. Storage management ([`mod@sqlite`] and the contracts in [`mod@traits`]). You should never
//!    need to query the database directly; use the public API instead. The exception is the data
//!    types, which are defined in [`mod@db_types`] and are public.
//! 2. The tracking public API ([`TrackingApi`]), which validates input, enforces the central
//!    [`mod@access`] policy and performs the ETA computation.
pub mod access;
pub mod db_types;
pub mod geo;
pub mod tracking_api;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::{db, SqliteDatabase};
pub use tracking_api::{TrackingApi, TrackingApiError};
pub use traits::{OrderDirectory, TrackingStore, TrackingStoreError};
