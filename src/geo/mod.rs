//! Geographic primitives and location tracking.

mod distance;
mod gps;
mod ip_lookup;
mod location;
mod refresh;

pub use distance::{distance, haversine_km};
pub use gps::{GpsReport, GpsTrack};
pub use ip_lookup::{IpGeolocator, IpLocation, parse_service_response};
pub use location::{LocationCell, LocationFix, LocationSource};
pub use refresh::{refresh_once, run_refresh_loop};

use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a point from degrees.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// The point as a `[lat, lng]` pair, as used in route polylines.
    pub const fn as_pair(self) -> [f64; 2] {
        [self.latitude, self.longitude]
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.latitude, self.longitude)
    }
}
