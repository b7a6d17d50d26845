//! Interface contracts for tracking storage backends.
//!
//! The domain service is written against these traits so that it can be exercised with mocks and
//! so that the durable store is swappable. [`TrackingStore`] owns the `tracking_record` table;
//! [`OrderDirectory`] is the read-mostly view of the external order store.

mod order_directory;
mod tracking_store;

pub use order_directory::OrderDirectory;
pub use tracking_store::{TrackingStore, TrackingStoreError};
