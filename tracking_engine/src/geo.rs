//! Great-circle distance and ETA arithmetic.
//!
//! The numbers here deliberately stay simple: deliveries are short urban hops, so a spherical
//! earth model and a straight-line distance are accurate enough for an arrival estimate. Anything
//! fancier (map matching, turn-by-turn routing) belongs to an external routing service.

use chrono::{DateTime, Duration, Utc};

use crate::db_types::Coordinates;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Speed assumed when the agent's device does not report one.
pub const DEFAULT_SPEED_KMH: f64 = 20.0;

/// Lower bound on the speed used for ETA division. Near-zero reported speeds (an agent waiting at
/// a traffic light) would otherwise blow the estimate up to hours.
pub const MIN_EFFECTIVE_SPEED_KMH: f64 = 5.0;

/// Haversine distance between two points, in kilometres.
///
/// Symmetric in its arguments and zero for identical points.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// The speed to divide by when estimating arrival: the reported speed if present, else
/// [`DEFAULT_SPEED_KMH`], floored at [`MIN_EFFECTIVE_SPEED_KMH`].
pub fn effective_speed_kmh(reported: Option<f64>) -> f64 {
    reported.unwrap_or(DEFAULT_SPEED_KMH).max(MIN_EFFECTIVE_SPEED_KMH)
}

/// Projects an arrival time from a distance and an effective speed.
pub fn arrival_time(now: DateTime<Utc>, distance_km: f64, speed_kmh: f64) -> DateTime<Utc> {
    let seconds = (distance_km / speed_kmh * 3600.0).round() as i64;
    now + Duration::seconds(seconds)
}
