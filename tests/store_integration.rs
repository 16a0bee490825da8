//! Integration tests for the CSV record store.

#![allow(clippy::unwrap_used)]

use chrono::{Duration as ChronoDuration, Local};
use pavewatch::Error;
use pavewatch::geo::GeoPoint;
use pavewatch::store::{RecordStore, StorePaths};
use std::fs;
use tempfile::TempDir;

fn open(dir: &TempDir) -> RecordStore {
    RecordStore::open(StorePaths::in_dir(dir.path())).unwrap()
}

#[test]
fn test_fresh_store_has_header_only_ledgers() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);

    let active = fs::read_to_string(&store.paths().detections).unwrap();
    let archive = fs::read_to_string(&store.paths().repairs).unwrap();
    assert_eq!(
        active.trim_end(),
        "ID,Timestamp,Image_Path,Latitude,Longitude,Detection_Type,Confidence"
    );
    assert!(archive.trim_end().ends_with("Repair_Date,Technician,Notes"));
    assert_eq!(store.next_id().unwrap(), 1);
}

#[test]
fn test_add_fix_and_stats() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);

    let pothole = store
        .add("a.jpg", Some(GeoPoint::new(23.81, 90.41)), "pothole", 0.91)
        .unwrap();
    let crack = store.add("b.jpg", None, "crack", 0.62).unwrap();
    let _low = store.add("c.jpg", None, "crack", 0.31).unwrap();
    assert_eq!((pothole, crack), (1, 2));

    let message = store.promote(pothole, "Rahim", "patched").unwrap();
    assert_eq!(message, "Pothole #1 has been fixed!");

    let active = store.list_active().unwrap();
    assert_eq!(active.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2, 3]);

    let archived = store.list_archived().unwrap();
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].detection.id, 1);
    assert_eq!(archived[0].technician, "Rahim");
    assert_eq!(archived[0].detection.location, Some(GeoPoint::new(23.81, 90.41)));

    let stats = store.stats().unwrap();
    assert_eq!(stats.total_detections, 2);
    assert_eq!(stats.category_count("crack"), 2);
    assert_eq!(stats.fixed_count, 1);
    assert_eq!(stats.fixed_category_count("pothole"), 1);
    assert_eq!((stats.high_severity, stats.medium_severity, stats.low_severity), (0, 1, 1));
    assert!((stats.avg_confidence - 46.5).abs() < 1e-9);
    assert_eq!(stats.today_count, 2);
    assert_eq!(stats.week_count, 2);

    // Ids are never reused after a record is archived.
    assert_eq!(store.add("d.jpg", None, "pothole", 0.5).unwrap(), 4);
}

#[test]
fn test_fix_unknown_id_leaves_ledgers_untouched() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    store.add("a.jpg", None, "pothole", 0.7).unwrap();

    let before_active = fs::read(&store.paths().detections).unwrap();
    let before_archive = fs::read(&store.paths().repairs).unwrap();

    let err = store.promote(99, "", "").unwrap_err();
    assert!(matches!(err, Error::RecordNotFound { id: 99 }));
    assert_eq!(err.to_string(), "Detection not found");

    assert_eq!(fs::read(&store.paths().detections).unwrap(), before_active);
    assert_eq!(fs::read(&store.paths().repairs).unwrap(), before_archive);
}

#[test]
fn test_next_id_spans_both_ledgers() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("detections.csv"),
        "ID,Timestamp,Image_Path,Latitude,Longitude,Detection_Type,Confidence\n\
         3,2024-05-01 08:00:00,a.jpg,23.8,90.4,pothole,0.9\n\
         7,2024-05-01 08:01:00,b.jpg,,,crack,0.6\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("repairs.csv"),
        "ID,Timestamp,Image_Path,Latitude,Longitude,Detection_Type,Confidence,Repair_Date,Technician,Notes\n\
         10,2024-04-01 08:00:00,c.jpg,23.8,90.4,pothole,0.8,2024-04-02 09:00:00,Karim,\n",
    )
    .unwrap();

    let store = open(&dir);
    assert_eq!(store.next_id().unwrap(), 11);
    assert_eq!(store.add("e.jpg", None, "pothole", 0.5).unwrap(), 11);
}

#[test]
fn test_malformed_rows_are_skipped() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("detections.csv"),
        "ID,Timestamp,Image_Path,Latitude,Longitude,Detection_Type,Confidence\n\
         1,2024-05-01 08:00:00,a.jpg,23.8,90.4,pothole,0.9\n\
         x,not a date,b.jpg,,,crack,0.6\n\
         2,2024-05-01 08:02:00,c.jpg,,,crack,0.4\n",
    )
    .unwrap();

    let store = open(&dir);
    let active = store.list_active().unwrap();
    assert_eq!(active.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(active[1].location, None);
    assert_eq!(active[1].location_label(), "Unknown");
}

#[test]
fn test_week_window_counts_last_seven_days() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let now = Local::now().naive_local();

    store.add_at("a.jpg", None, "pothole", 0.9, now).unwrap();
    store
        .add_at("b.jpg", None, "pothole", 0.9, now - ChronoDuration::days(3))
        .unwrap();
    store
        .add_at("c.jpg", None, "pothole", 0.9, now - ChronoDuration::days(30))
        .unwrap();

    let stats = store.stats().unwrap();
    assert_eq!(stats.total_detections, 3);
    assert_eq!(stats.today_count, 1);
    assert_eq!(stats.week_count, 2);
}
