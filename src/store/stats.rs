//! Aggregate statistics over the ledgers.

use super::record::{ConfidenceBand, DetectionRecord, RepairRecord};
use chrono::{Days, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

/// Summary of active and archived detections.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectionStats {
    /// Number of active detections.
    pub total_detections: usize,
    /// Active detections per category (case-folded).
    pub by_category: BTreeMap<String, usize>,
    /// Number of archived repairs.
    pub fixed_count: usize,
    /// Archived repairs per category (case-folded).
    pub fixed_by_category: BTreeMap<String, usize>,
    /// Mean active confidence as a percentage, one decimal.
    pub avg_confidence: f64,
    /// Active detections in the high band.
    pub high_severity: usize,
    /// Active detections in the medium band.
    pub medium_severity: usize,
    /// Active detections in the low band.
    pub low_severity: usize,
    /// Active detections created on `today`.
    pub today_count: usize,
    /// Active detections created in the last seven days.
    pub week_count: usize,
}

impl DetectionStats {
    /// Active count for one category, case-insensitive.
    pub fn category_count(&self, category: &str) -> usize {
        self.by_category
            .get(&category.trim().to_lowercase())
            .copied()
            .unwrap_or(0)
    }

    /// Archived count for one category, case-insensitive.
    pub fn fixed_category_count(&self, category: &str) -> usize {
        self.fixed_by_category
            .get(&category.trim().to_lowercase())
            .copied()
            .unwrap_or(0)
    }
}

/// Compute statistics with `today` as the reference date.
pub fn compute_stats(
    active: &[DetectionRecord],
    archived: &[RepairRecord],
    today: NaiveDate,
) -> DetectionStats {
    let mut stats = DetectionStats {
        total_detections: active.len(),
        fixed_count: archived.len(),
        ..DetectionStats::default()
    };

    let week_start = today.checked_sub_days(Days::new(7)).unwrap_or(NaiveDate::MIN);
    let mut confidence_sum = 0.0;

    for record in active {
        *stats.by_category.entry(record.category.key()).or_default() += 1;
        confidence_sum += record.confidence * 100.0;

        match record.band() {
            ConfidenceBand::High => stats.high_severity += 1,
            ConfidenceBand::Medium => stats.medium_severity += 1,
            ConfidenceBand::Low => stats.low_severity += 1,
        }

        let day = record.timestamp.date();
        if day == today {
            stats.today_count += 1;
        }
        if day >= week_start {
            stats.week_count += 1;
        }
    }

    for repair in archived {
        *stats
            .fixed_by_category
            .entry(repair.detection.category.key())
            .or_default() += 1;
    }

    if !active.is_empty() {
        #[allow(clippy::cast_precision_loss)]
        let mean = confidence_sum / active.len() as f64;
        stats.avg_confidence = (mean * 10.0).round() / 10.0;
    }

    stats
}
