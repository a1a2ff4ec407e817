use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Convenience alias for UTC DT
pub type UtcDT = DateTime<Utc>;

/// Mean radius of the Earth used for distance calculations, in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.071;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, specta::Type)]
/// A point on the globe as reported by a Geolocation API, in degrees
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Great-circle distance between two points in meters, using the `asin` form of the
/// haversine formula.
pub fn haversine_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let rlat1 = a.latitude.to_radians();
    let rlat2 = b.latitude.to_radians();
    let difflat = rlat2 - rlat1;
    let difflon = (b.longitude - a.longitude).to_radians();

    let h = (difflat / 2.0).sin().powi(2)
        + rlat1.cos() * rlat2.cos() * (difflon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.sqrt().asin() * 1000.0
}

#[derive(Debug, Clone, Serialize, Deserialize, specta::Type)]
/// The result of a single location sample, sent to the UI
pub struct DistanceSample {
    /// Where the device was
    pub position: GeoPoint,
    /// Distance from the configured origin in meters
    pub distance_meters: f64,
    /// When the position was read
    pub taken_at: UtcDT,
}

impl DistanceSample {
    pub fn new(position: GeoPoint, origin: GeoPoint) -> Self {
        Self {
            position,
            distance_meters: haversine_distance(position, origin),
            taken_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-6;

    #[test]
    fn same_point_is_zero() {
        for point in [
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(43.0845, -77.6749),
            GeoPoint::new(-33.8688, 151.2093),
            GeoPoint::new(89.9, 179.9),
        ] {
            assert_eq!(haversine_distance(point, point), 0.0);
        }
    }

    #[test]
    fn symmetric() {
        let a = GeoPoint::new(40.7128, -74.0060);
        let b = GeoPoint::new(51.5074, -0.1278);
        let ab = haversine_distance(a, b);
        let ba = haversine_distance(b, a);
        assert!((ab - ba).abs() < TOLERANCE, "{ab} != {ba}");
    }

    #[test]
    fn one_degree_latitude_at_equator() {
        let d = haversine_distance(GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 0.0));
        let expected = EARTH_RADIUS_KM * 1000.0 * std::f64::consts::PI / 180.0;
        assert!((d - expected).abs() < TOLERANCE, "got {d}");
        assert!((d - 111_196.0).abs() < 1.0, "got {d}");
    }

    #[test]
    fn one_degree_longitude_at_equator_matches_latitude() {
        let lat = haversine_distance(GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 0.0));
        let lon = haversine_distance(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 1.0));
        assert!((lat - lon).abs() < TOLERANCE);
    }

    #[test]
    fn antipodes_are_half_circumference() {
        let d = haversine_distance(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 180.0));
        let expected = EARTH_RADIUS_KM * 1000.0 * std::f64::consts::PI;
        assert!((d - expected).abs() < 1e-3);
    }

    #[test]
    fn sample_uses_origin() {
        let sample = DistanceSample::new(GeoPoint::new(1.0, 0.0), GeoPoint::new(0.0, 0.0));
        let expected = EARTH_RADIUS_KM * 1000.0 * std::f64::consts::PI / 180.0;
        assert!((sample.distance_meters - expected).abs() < TOLERANCE);
        assert_eq!(sample.position, GeoPoint::new(1.0, 0.0));
    }
}
