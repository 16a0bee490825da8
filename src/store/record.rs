//! Ledger record types.

use crate::constants::confidence::{HIGH, MEDIUM};
use crate::geo::GeoPoint;
use chrono::NaiveDateTime;
use serde::Serialize;

/// Defect category label, as produced by the detector label list.
///
/// Comparison with user input is case-insensitive; the stored spelling is
/// kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    /// Wrap a label.
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into().trim().to_string())
    }

    /// Stored spelling.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-folded key used for grouping.
    pub fn key(&self) -> String {
        self.0.to_lowercase()
    }

    /// Case-insensitive match against user input.
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other.trim())
    }

    /// Title-cased form for messages ("road crack" -> "Road Crack").
    pub fn title(&self) -> String {
        title_case(&self.0)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}

/// Uppercase the first letter of every alphabetic run, lowercase the rest.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// An active (unrepaired) detection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionRecord {
    /// Unique id across active and archived ledgers.
    pub id: u64,
    /// Creation time (local).
    pub timestamp: NaiveDateTime,
    /// Path to the captured image.
    pub image_path: String,
    /// Where the defect was seen; `None` when unknown.
    pub location: Option<GeoPoint>,
    /// Defect category.
    pub category: Category,
    /// Detector confidence in [0, 1].
    pub confidence: f64,
}

impl DetectionRecord {
    /// Confidence band of this record.
    pub fn band(&self) -> ConfidenceBand {
        ConfidenceBand::of(self.confidence)
    }

    /// Location as shown to users.
    pub fn location_label(&self) -> String {
        self.location.map_or_else(
            || crate::constants::location::UNKNOWN.to_string(),
            |p| p.to_string(),
        )
    }
}

/// A detection that has been repaired and moved to the archive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepairRecord {
    /// The original detection, unchanged.
    #[serde(flatten)]
    pub detection: DetectionRecord,
    /// When the repair was recorded.
    pub repair_date: NaiveDateTime,
    /// Who carried out the repair.
    pub technician: String,
    /// Free-form notes.
    pub notes: String,
}

/// Severity band derived from confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBand {
    /// Confidence >= 0.8.
    High,
    /// 0.5 <= confidence < 0.8.
    Medium,
    /// Confidence < 0.5.
    Low,
}

impl ConfidenceBand {
    /// Classify a confidence value.
    pub fn of(confidence: f64) -> Self {
        if confidence >= HIGH {
            Self::High
        } else if confidence >= MEDIUM {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for ConfidenceBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        })
    }
}

impl std::str::FromStr for ConfidenceBand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(format!("unknown risk level: {other}")),
        }
    }
}
