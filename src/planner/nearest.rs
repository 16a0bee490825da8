//! Greedy nearest-neighbor tour.

use crate::error::{Error, Result};
use crate::geo::{GeoPoint, distance};

/// Visiting order over an input point set.
#[derive(Debug, Clone, PartialEq)]
pub struct Tour {
    /// Indices into the input, in visiting order. A permutation of the input.
    pub order: Vec<usize>,
    /// Sum of leg lengths in kilometres, without a return leg.
    pub total_km: f64,
}

/// Build a tour starting at `start` that always moves to the closest
/// unvisited point.
///
/// Ties go to the lowest index. An empty input yields an empty tour; any
/// other input requires `start < points.len()`.
pub fn nearest_neighbor_tour(points: &[GeoPoint], start: usize) -> Result<Tour> {
    if points.is_empty() {
        return Ok(Tour {
            order: Vec::new(),
            total_km: 0.0,
        });
    }
    if start >= points.len() {
        return Err(Error::InvalidStartIndex {
            index: start,
            len: points.len(),
        });
    }

    let mut visited = vec![false; points.len()];
    let mut order = Vec::with_capacity(points.len());
    let mut total_km = 0.0;

    visited[start] = true;
    order.push(start);
    let mut current = start;

    for _ in 1..points.len() {
        let mut nearest: Option<(usize, f64)> = None;

        for (j, point) in points.iter().enumerate() {
            if visited[j] {
                continue;
            }
            let d = distance(points[current], *point);
            if nearest.is_none_or(|(_, best)| d < best) {
                nearest = Some((j, d));
            }
        }

        let Some((next, d)) = nearest else {
            break;
        };
        visited[next] = true;
        order.push(next);
        total_km += d;
        current = next;
    }

    Ok(Tour { order, total_km })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        let tour = nearest_neighbor_tour(&[], 0).unwrap();
        assert!(tour.order.is_empty());
        assert_eq!(tour.total_km, 0.0);
    }

    #[test]
    fn test_single_point() {
        let tour = nearest_neighbor_tour(&[GeoPoint::new(5.0, 5.0)], 0).unwrap();
        assert_eq!(tour.order, vec![0]);
        assert_eq!(tour.total_km, 0.0);
    }

    #[test]
    fn test_start_out_of_range() {
        let points = [GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 1.0)];
        let err = nearest_neighbor_tour(&points, 2).unwrap_err();
        assert!(matches!(err, Error::InvalidStartIndex { index: 2, len: 2 }));
    }

    #[test]
    fn test_tie_prefers_lowest_index() {
        // Both neighbors sit exactly one degree away on the equator.
        let points = [
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 1.0),
            GeoPoint::new(0.0, -1.0),
        ];
        let tour = nearest_neighbor_tour(&points, 0).unwrap();
        assert_eq!(tour.order, vec![0, 1, 2]);
    }

    #[test]
    fn test_start_in_the_middle() {
        let points = [
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 1.0),
            GeoPoint::new(0.0, 3.0),
        ];
        let tour = nearest_neighbor_tour(&points, 1).unwrap();
        assert_eq!(tour.order, vec![1, 0, 2]);
        let expected = distance(points[1], points[0]) + distance(points[0], points[2]);
        assert!((tour.total_km - expected).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_points_all_visited() {
        let p = GeoPoint::new(23.8, 90.4);
        let tour = nearest_neighbor_tour(&[p, p, p], 0).unwrap();
        assert_eq!(tour.order, vec![0, 1, 2]);
        assert_eq!(tour.total_km, 0.0);
    }
}
