//! Recorded GPS track replayed alongside a frame stream.
//!
//! The track is JSON Lines, one report per line:
//! `{"frame": 12, "latitude": 23.81, "longitude": 90.41, "timestamp": "2024-05-01T08:00:00Z"}`.
//! `timestamp` is optional; a report without one counts as observed when its
//! frame is reached.

use super::{GeoPoint, LocationCell};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, warn};

/// One GPS report tied to the frame it arrived with.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GpsReport {
    /// Frame number (1-based) at which the report becomes known.
    pub frame: u64,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// When the receiver took the fix.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl GpsReport {
    fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// GPS reports grouped by frame.
#[derive(Debug, Default, Clone)]
pub struct GpsTrack {
    reports: HashMap<u64, Vec<GpsReport>>,
}

impl GpsTrack {
    /// Load a track from a JSON Lines file. Unparseable or out-of-range
    /// lines are skipped with a warning.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::GpsTrackLoad {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut reports = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| Error::GpsTrackLoad {
                path: path.to_path_buf(),
                source: e,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<GpsReport>(&line) {
                Ok(report) if report.is_valid() => reports.push(report),
                Ok(_) => warn!("{}:{}: coordinates out of range", path.display(), index + 1),
                Err(e) => warn!("{}:{}: skipping GPS line: {e}", path.display(), index + 1),
            }
        }

        let track = Self::from_reports(reports);
        debug!("Loaded {} GPS report(s)", track.len());
        Ok(track)
    }

    /// Build a track from in-memory reports.
    pub fn from_reports(reports: impl IntoIterator<Item = GpsReport>) -> Self {
        let mut track = Self::default();
        for report in reports {
            track.reports.entry(report.frame).or_default().push(report);
        }
        track
    }

    /// Number of reports.
    pub fn len(&self) -> usize {
        self.reports.values().map(Vec::len).sum()
    }

    /// Whether the track holds no reports.
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Feed the reports for `frame` into `cell`, in file order.
    ///
    /// Reports without a timestamp are stamped with `now`. Returns how many
    /// reports were applied.
    pub fn apply(&self, frame: u64, cell: &LocationCell, now: DateTime<Utc>) -> usize {
        let Some(reports) = self.reports.get(&frame) else {
            return 0;
        };
        for report in reports {
            cell.update_gps_at(
                GeoPoint::new(report.latitude, report.longitude),
                report.timestamp.unwrap_or(now),
            );
        }
        reports.len()
    }
}
