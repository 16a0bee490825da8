//! Great-circle distance.

use super::GeoPoint;
use crate::constants::route::EARTH_RADIUS_KM;

/// Haversine distance in kilometres between two points given in degrees.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // Rounding can push `a` a hair above 1 for antipodal points.
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * c
}

/// Haversine distance in kilometres between two points.
pub fn distance(a: GeoPoint, b: GeoPoint) -> f64 {
    haversine_km(a.latitude, a.longitude, b.latitude, b.longitude)
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_identity_is_zero() {
        let points = [
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(60.1699, 24.9384),
            GeoPoint::new(-33.8688, 151.2093),
        ];
        for p in points {
            assert_eq!(distance(p, p), 0.0);
        }
    }

    #[test]
    fn test_distance_is_symmetric() {
        let helsinki = GeoPoint::new(60.1699, 24.9384);
        let dhaka = GeoPoint::new(23.8103, 90.4125);
        assert_eq!(distance(helsinki, dhaka), distance(dhaka, helsinki));
    }

    #[test]
    fn test_one_degree_of_longitude_on_equator() {
        // 2 * pi * 6371 / 360
        let d = distance(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 1.0));
        assert!((d - 111.194_926_6).abs() < 1e-6, "got {d}");
    }

    #[test]
    fn test_antipodal_points_are_finite() {
        let d = distance(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 180.0));
        assert!(d.is_finite());
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }
}
