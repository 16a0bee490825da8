//! Filtering and ordering of detection lists.

use super::record::{ConfidenceBand, DetectionRecord};
use std::cmp::Ordering;

/// Filter for listing detections.
#[derive(Debug, Clone, Default)]
pub struct DetectionFilter {
    /// Keep only this category (case-insensitive); `None` or `"all"` keeps all.
    pub category: Option<String>,
    /// Keep only this confidence band.
    pub band: Option<ConfidenceBand>,
    /// Keep only records with a known location.
    pub located_only: bool,
}

impl DetectionFilter {
    /// Whether `record` passes the filter.
    pub fn accepts(&self, record: &DetectionRecord) -> bool {
        if let Some(category) = self.category.as_deref()
            && !is_all(category)
            && !record.category.matches(category)
        {
            return false;
        }
        if let Some(band) = self.band
            && record.band() != band
        {
            return false;
        }
        !self.located_only || record.location.is_some()
    }

    /// Apply the filter, keeping input order.
    pub fn apply(&self, records: Vec<DetectionRecord>) -> Vec<DetectionRecord> {
        records.into_iter().filter(|r| self.accepts(r)).collect()
    }
}

/// Whether a category argument means "no filter".
pub fn is_all(category: &str) -> bool {
    category.trim().eq_ignore_ascii_case("all")
}

/// Stable sort by confidence, highest first.
pub fn sort_by_confidence_desc(records: &mut [DetectionRecord]) {
    records.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;
    use crate::store::Category;
    use chrono::NaiveDateTime;

    fn record(id: u64, category: &str, confidence: f64, located: bool) -> DetectionRecord {
        DetectionRecord {
            id,
            timestamp: NaiveDateTime::default(),
            image_path: String::new(),
            location: located.then(|| GeoPoint::new(1.0, 2.0)),
            category: Category::new(category),
            confidence,
        }
    }

    #[test]
    fn test_category_filter_all_and_case() {
        let records = vec![
            record(1, "pothole", 0.9, true),
            record(2, "crack", 0.9, true),
        ];

        let all = DetectionFilter {
            category: Some("ALL".to_string()),
            ..Default::default()
        };
        assert_eq!(all.apply(records.clone()).len(), 2);

        let potholes = DetectionFilter {
            category: Some("Pothole".to_string()),
            ..Default::default()
        };
        let kept = potholes.apply(records);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, 1);
    }

    #[test]
    fn test_band_and_location_filter() {
        let records = vec![
            record(1, "pothole", 0.85, false),
            record(2, "pothole", 0.85, true),
            record(3, "pothole", 0.55, true),
        ];
        let filter = DetectionFilter {
            band: Some(ConfidenceBand::High),
            located_only: true,
            ..Default::default()
        };
        let ids: Vec<u64> = filter.apply(records).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn test_sort_is_stable() {
        let mut records = vec![
            record(1, "a", 0.5, true),
            record(2, "a", 0.9, true),
            record(3, "a", 0.5, true),
            record(4, "a", 0.9, true),
        ];
        sort_by_confidence_desc(&mut records);
        let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 4, 1, 3]);
    }
}
