//! Geodesic helpers.  Every distance comparison in the crate goes through
//! [`distance`] so thresholds stay consistent.

use crate::types::LatLng;

/// Equatorial earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Great-circle (haversine) distance between two coordinates, in metres.
pub fn distance(a: LatLng, b: LatLng) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let d_phi = (b.lat - a.lat).to_radians();
    let d_lambda = (b.lng - a.lng).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Round to 14 decimal places (the precision the game client transmits).
pub fn round14(v: f64) -> f64 {
    const SCALE: f64 = 1e14;
    (v * SCALE).round() / SCALE
}
