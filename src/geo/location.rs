//! Shared latest-known-location cell.
//!
//! One [`LocationCell`] is created at startup and handed (behind an `Arc`) to
//! both the background refresh loop and every stream processor. Writers
//! replace a whole [`LocationFix`] under the write lock and readers copy a
//! fix out under the read lock, so a coordinate pair is never observed torn.

use super::GeoPoint;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

/// Where a location fix came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationSource {
    /// Device GPS report.
    Gps,
    /// IP geolocation fallback.
    Ip,
    /// Fixed location supplied by the operator; never expires.
    Manual,
}

impl std::fmt::Display for LocationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gps => write!(f, "gps"),
            Self::Ip => write!(f, "ip"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// A single location observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationFix {
    /// Observed position.
    pub point: GeoPoint,
    /// Origin of the observation.
    pub source: LocationSource,
    /// When the observation was recorded.
    pub updated_at: DateTime<Utc>,
    /// City name, when the source reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Country name, when the source reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

#[derive(Debug, Default)]
struct LocationState {
    gps: Option<LocationFix>,
    ip: Option<LocationFix>,
    pinned: Option<LocationFix>,
}

/// Synchronized latest-known location.
#[derive(Debug)]
pub struct LocationCell {
    state: RwLock<LocationState>,
    gps_max_age: Duration,
}

impl LocationCell {
    /// Create an empty cell. GPS fixes older than `gps_max_age` yield to IP fixes.
    pub fn new(gps_max_age: Duration) -> Self {
        Self {
            state: RwLock::new(LocationState::default()),
            gps_max_age,
        }
    }

    /// Create a cell pinned to a fixed location.
    pub fn pinned(point: GeoPoint) -> Self {
        let cell = Self::new(Duration::MAX);
        cell.write(|state| {
            state.pinned = Some(LocationFix {
                point,
                source: LocationSource::Manual,
                updated_at: Utc::now(),
                city: None,
                country: None,
            });
        });
        cell
    }

    /// Record a GPS report.
    pub fn update_gps(&self, point: GeoPoint) {
        self.update_gps_at(point, Utc::now());
    }

    /// Record a GPS report observed at `at`.
    pub fn update_gps_at(&self, point: GeoPoint, at: DateTime<Utc>) {
        self.write(|state| {
            state.gps = Some(LocationFix {
                point,
                source: LocationSource::Gps,
                updated_at: at,
                city: None,
                country: None,
            });
        });
    }

    /// Record an IP geolocation result.
    pub fn update_ip(&self, point: GeoPoint, city: Option<String>, country: Option<String>) {
        self.update_ip_at(point, city, country, Utc::now());
    }

    /// Record an IP geolocation result observed at `at`.
    pub fn update_ip_at(
        &self,
        point: GeoPoint,
        city: Option<String>,
        country: Option<String>,
        at: DateTime<Utc>,
    ) {
        self.write(|state| {
            state.ip = Some(LocationFix {
                point,
                source: LocationSource::Ip,
                updated_at: at,
                city,
                country,
            });
        });
    }

    /// The fix that detections should be attributed to right now.
    pub fn current(&self) -> Option<LocationFix> {
        self.current_at(Utc::now())
    }

    /// The fix that detections should be attributed to at `now`.
    ///
    /// A pinned location always wins. Otherwise a fresh GPS fix is used, and
    /// past that the most recent of the stale GPS fix and the IP fix.
    pub fn current_at(&self, now: DateTime<Utc>) -> Option<LocationFix> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);

        if let Some(pinned) = &state.pinned {
            return Some(pinned.clone());
        }

        match (&state.gps, &state.ip) {
            (Some(gps), _) if self.is_fresh(gps, now) => Some(gps.clone()),
            (Some(gps), Some(ip)) => {
                if gps.updated_at > ip.updated_at {
                    Some(gps.clone())
                } else {
                    Some(ip.clone())
                }
            }
            (Some(gps), None) => Some(gps.clone()),
            (None, Some(ip)) => Some(ip.clone()),
            (None, None) => None,
        }
    }

    /// Current position only.
    pub fn point(&self) -> Option<GeoPoint> {
        self.current().map(|fix| fix.point)
    }

    /// Whether the refresh loop should consult IP geolocation at `now`.
    pub fn needs_ip_refresh_at(&self, now: DateTime<Utc>) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if state.pinned.is_some() {
            return false;
        }
        state.gps.as_ref().is_none_or(|gps| !self.is_fresh(gps, now))
    }

    fn is_fresh(&self, fix: &LocationFix, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(fix.updated_at);
        age.to_std().map_or(true, |age| age <= self.gps_max_age)
    }

    fn write(&self, f: impl FnOnce(&mut LocationState)) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn cell() -> LocationCell {
        LocationCell::new(Duration::from_secs(120))
    }

    #[test]
    fn test_empty_cell_is_unknown() {
        let cell = cell();
        assert!(cell.current().is_none());
        assert!(cell.needs_ip_refresh_at(Utc::now()));
    }

    #[test]
    fn test_fresh_gps_beats_newer_ip() {
        let cell = cell();
        let now = Utc::now();
        cell.update_gps_at(GeoPoint::new(1.0, 1.0), now - TimeDelta::seconds(30));
        cell.update_ip_at(GeoPoint::new(2.0, 2.0), None, None, now);

        let fix = cell.current_at(now).unwrap();
        assert_eq!(fix.source, LocationSource::Gps);
        assert!(!cell.needs_ip_refresh_at(now));
    }

    #[test]
    fn test_stale_gps_falls_back_to_ip() {
        let cell = cell();
        let now = Utc::now();
        cell.update_gps_at(GeoPoint::new(1.0, 1.0), now - TimeDelta::seconds(300));
        cell.update_ip_at(
            GeoPoint::new(2.0, 2.0),
            Some("Dhaka".to_string()),
            None,
            now - TimeDelta::seconds(10),
        );

        let fix = cell.current_at(now).unwrap();
        assert_eq!(fix.source, LocationSource::Ip);
        assert_eq!(fix.city.as_deref(), Some("Dhaka"));
        assert!(cell.needs_ip_refresh_at(now));
    }

    #[test]
    fn test_stale_gps_kept_without_ip() {
        let cell = cell();
        let now = Utc::now();
        cell.update_gps_at(GeoPoint::new(1.0, 1.0), now - TimeDelta::seconds(600));
        let fix = cell.current_at(now).unwrap();
        assert_eq!(fix.point, GeoPoint::new(1.0, 1.0));
    }

    #[test]
    fn test_pinned_location_never_refreshes() {
        let cell = LocationCell::pinned(GeoPoint::new(23.7, 90.4));
        cell.update_gps(GeoPoint::new(0.5, 0.5));
        assert_eq!(cell.point(), Some(GeoPoint::new(23.7, 90.4)));
        assert!(!cell.needs_ip_refresh_at(Utc::now()));
    }
}
