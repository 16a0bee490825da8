//! Integration tests for route planning over stored detections.

#![allow(clippy::unwrap_used, clippy::float_cmp)]

use pavewatch::Error;
use pavewatch::geo::{GeoPoint, haversine_km};
use pavewatch::planner::{RouteOptions, nearest_neighbor_tour, plan_route};
use pavewatch::store::{RecordStore, StorePaths};
use tempfile::TempDir;

#[test]
fn test_collinear_points_visited_in_line() {
    // A, B and C on the equator, B between A and C.
    let points = [
        GeoPoint::new(0.0, 0.0),
        GeoPoint::new(0.0, 2.0),
        GeoPoint::new(0.0, 1.0),
    ];
    let tour = nearest_neighbor_tour(&points, 0).unwrap();
    assert_eq!(tour.order, vec![0, 2, 1]);
    assert!((tour.total_km - haversine_km(0.0, 0.0, 0.0, 2.0)).abs() < 1e-9);
}

#[test]
fn test_tour_is_a_permutation() {
    let points: Vec<GeoPoint> = (0..9)
        .map(|i| {
            let f = f64::from(i);
            GeoPoint::new(23.7 + (f * 0.37).sin() * 0.1, 90.3 + (f * 0.71).cos() * 0.1)
        })
        .collect();

    for start in [0, 4, 8] {
        let tour = nearest_neighbor_tour(&points, start).unwrap();
        assert_eq!(tour.order[0], start);
        let mut seen = tour.order.clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..points.len()).collect::<Vec<_>>());
    }
}

#[test]
fn test_route_from_store() {
    let dir = TempDir::new().unwrap();
    let store = RecordStore::open(StorePaths::in_dir(dir.path())).unwrap();
    store
        .add("a.jpg", Some(GeoPoint::new(0.0, 0.0)), "pothole", 0.95)
        .unwrap();
    store
        .add("b.jpg", Some(GeoPoint::new(0.0, 2.0)), "pothole", 0.90)
        .unwrap();
    store
        .add("c.jpg", Some(GeoPoint::new(0.0, 1.0)), "crack", 0.85)
        .unwrap();
    store.add("d.jpg", None, "pothole", 0.99).unwrap();

    let plan = plan_route(store.list_active().unwrap(), &RouteOptions::default()).unwrap();
    assert_eq!(
        plan.points.iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![1, 3, 2]
    );
    assert_eq!(plan.polyline, vec![[0.0, 0.0], [0.0, 1.0], [0.0, 2.0]]);
    assert_eq!(plan.total_distance, 222.39);
    assert_eq!(plan.estimated_minutes, 444);
    assert_eq!(plan.skipped_unlocated, 1);

    // The unlocated top detection must not take one of the capped slots.
    let capped = RouteOptions {
        count: 3,
        ..RouteOptions::default()
    };
    let plan = plan_route(store.list_active().unwrap(), &capped).unwrap();
    assert_eq!(plan.points.len(), 3);

    let potholes = RouteOptions {
        category: Some("pothole".to_string()),
        ..RouteOptions::default()
    };
    let plan = plan_route(store.list_active().unwrap(), &potholes).unwrap();
    assert_eq!(
        plan.points.iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![1, 2]
    );
}

#[test]
fn test_route_without_located_detections() {
    let dir = TempDir::new().unwrap();
    let store = RecordStore::open(StorePaths::in_dir(dir.path())).unwrap();
    store.add("a.jpg", None, "pothole", 0.9).unwrap();

    let err = plan_route(store.list_active().unwrap(), &RouteOptions::default()).unwrap_err();
    assert!(matches!(err, Error::NoDetections));
    assert_eq!(err.to_string(), "No detections found");
}
