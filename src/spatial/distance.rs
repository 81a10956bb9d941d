// src/spatial/distance.rs
use geo_types::Point;

/// Earth radius in meters used for great-circle distances.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance in meters between two (lat, lon) pairs.
pub fn calculate_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let (delta_phi, delta_lambda) = ((lat2 - lat1).to_radians(), (lon2 - lon1).to_radians());
    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Great-circle distance in meters between two (lon, lat) points.
pub fn distance_meters(a: Point<f64>, b: Point<f64>) -> f64 {
    calculate_distance(a.y(), a.x(), b.y(), b.x())
}
