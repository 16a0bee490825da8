//! Repair route built from ledger detections.

use super::nearest::nearest_neighbor_tour;
use crate::constants::route::{DEFAULT_AVERAGE_SPEED_KMH, DEFAULT_COUNT};
use crate::error::{Error, Result};
use crate::geo::GeoPoint;
use crate::store::{DetectionFilter, DetectionRecord, sort_by_confidence_desc};
use serde::Serialize;
use tracing::{debug, warn};

/// Candidate selection and travel assumptions.
#[derive(Debug, Clone)]
pub struct RouteOptions {
    /// Maximum number of detections to visit.
    pub count: usize,
    /// Category filter; `None` or `"all"` keeps every category.
    pub category: Option<String>,
    /// Average travel speed for the time estimate.
    pub average_speed_kmh: f64,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            count: DEFAULT_COUNT,
            category: None,
            average_speed_kmh: DEFAULT_AVERAGE_SPEED_KMH,
        }
    }
}

/// An ordered repair visit plan.
#[derive(Debug, Clone, Serialize)]
pub struct RoutePlan {
    /// Detections in visiting order.
    pub points: Vec<DetectionRecord>,
    /// Tour length in kilometres, rounded to two decimals.
    pub total_distance: f64,
    /// Whole minutes of travel at the configured speed.
    pub estimated_minutes: u64,
    /// `[lat, lng]` pairs in visiting order.
    pub polyline: Vec<[f64; 2]>,
    /// Matching detections left out because their location is unknown.
    pub skipped_unlocated: usize,
}

/// Detections chosen for a route.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidates {
    /// Located detections, highest confidence first, at most `count`.
    pub records: Vec<DetectionRecord>,
    /// Matching detections dropped for having no location.
    pub skipped_unlocated: usize,
}

/// Pick the highest-confidence located detections to visit.
///
/// Detections without a location are removed before the `count` cap, so the
/// cap only ever counts stops that can be visited.
pub fn select_candidates(records: Vec<DetectionRecord>, options: &RouteOptions) -> Candidates {
    let filter = DetectionFilter {
        category: options.category.clone(),
        ..DetectionFilter::default()
    };
    let (mut located, unlocated): (Vec<_>, Vec<_>) = filter
        .apply(records)
        .into_iter()
        .partition(|r| r.location.is_some());

    sort_by_confidence_desc(&mut located);
    located.truncate(options.count);
    Candidates {
        records: located,
        skipped_unlocated: unlocated.len(),
    }
}

/// Plan a route over the candidates selected from `records`.
///
/// The tour starts at the highest-confidence candidate.
pub fn plan_route(records: Vec<DetectionRecord>, options: &RouteOptions) -> Result<RoutePlan> {
    let Candidates {
        records: candidates,
        skipped_unlocated,
    } = select_candidates(records, options);
    if skipped_unlocated > 0 {
        warn!("Skipping {skipped_unlocated} detection(s) with unknown location");
    }
    if candidates.is_empty() {
        return Err(Error::NoDetections);
    }

    let points: Vec<GeoPoint> = candidates.iter().filter_map(|r| r.location).collect();
    let tour = nearest_neighbor_tour(&points, 0)?;

    let mut slots: Vec<Option<DetectionRecord>> = candidates.into_iter().map(Some).collect();
    let ordered: Vec<DetectionRecord> = tour
        .order
        .iter()
        .filter_map(|&i| slots.get_mut(i).and_then(Option::take))
        .collect();
    let polyline = tour.order.iter().map(|&i| points[i].as_pair()).collect();

    let total_distance = (tour.total_km * 100.0).round() / 100.0;
    let estimated_minutes = estimate_minutes(tour.total_km, options.average_speed_kmh);

    debug!(
        "Planned route over {} detection(s): {total_distance} km, ~{estimated_minutes} min",
        ordered.len()
    );

    Ok(RoutePlan {
        points: ordered,
        total_distance,
        estimated_minutes,
        polyline,
        skipped_unlocated,
    })
}

/// Floor of travel minutes for `km` at `speed_kmh`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn estimate_minutes(km: f64, speed_kmh: f64) -> u64 {
    if speed_kmh <= 0.0 || !km.is_finite() {
        return 0;
    }
    (km / speed_kmh * 60.0).floor().max(0.0) as u64
}
