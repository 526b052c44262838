//! Spherical geodesy helpers for position tracking and teleportation

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6378.137;

/// A latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Length of one meter in degrees of latitude
fn meter_in_degrees() -> f64 {
    1.0 / ((2.0 * std::f64::consts::PI / 360.0) * EARTH_RADIUS_KM) / 1000.0
}

/// Solve the forward geodesic (direct) problem on a sphere: starting from
/// `origin`, travel `distance_m` meters along `heading_deg` and return the
/// resulting coordinate.
///
/// Heading is normalized mod 360 before use. Valid for distances small
/// relative to the Earth radius; antipodal and polar starting points are not
/// special-cased.
pub fn destination_point(origin: Coordinate, distance_m: f64, heading_deg: f64) -> Coordinate {
    let heading = heading_deg.rem_euclid(360.0).to_radians();
    let angular = distance_m / (EARTH_RADIUS_KM * 1000.0);

    let lat1 = origin.lat.to_radians();
    let lng1 = origin.lng.to_radians();

    let lat2 =
        (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * heading.cos()).asin();
    let lng2 = lng1
        + (heading.sin() * angular.sin() * lat1.cos())
            .atan2(angular.cos() - lat1.sin() * lat2.sin());

    // Wrap longitude back into [-180, 180)
    let lng2_deg = (lng2.to_degrees() + 540.0).rem_euclid(360.0) - 180.0;

    Coordinate::new(lat2.to_degrees(), lng2_deg)
}

/// Check whether `point` falls inside a `radius_m` bounding box around any
/// coordinate in `history`.
///
/// Each box is a latitude/longitude half-width approximation, with the
/// longitude half-width widened by `1/cos(lat)` to account for meridian
/// convergence. Not a true geodesic circle; accuracy degrades near the
/// poles, which is acceptable for the target use. Empty history is `false`.
pub fn bounding_box_contains(history: &[Coordinate], point: Coordinate, radius_m: f64) -> bool {
    let degrees = radius_m * meter_in_degrees();

    for visited in history {
        let d_lng = degrees / visited.lat.to_radians().cos();

        let min_lat = visited.lat - degrees;
        let max_lat = visited.lat + degrees;
        let min_lng = visited.lng - d_lng;
        let max_lng = visited.lng + d_lng;

        if point.lat > min_lat && point.lat < max_lat && point.lng > min_lng && point.lng < max_lng
        {
            return true;
        }
    }

    false
}
