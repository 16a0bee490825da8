//! Detector contract and the JSON Lines replay detector.

use super::source::Frame;
use crate::constants::stream::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_IOU_THRESHOLD};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, warn};

/// Thresholds passed to the detector on every call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectOptions {
    /// Minimum confidence for a box to be returned.
    pub confidence_threshold: f32,
    /// IoU above which overlapping boxes are suppressed.
    pub iou_threshold: f32,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        }
    }
}

/// One box as reported by a detector.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawDetection {
    /// `[x1, y1, x2, y2]` in pixels.
    pub bbox: [f32; 4],
    /// Confidence in [0, 1].
    pub confidence: f32,
    /// Index into the label list.
    #[serde(rename = "class")]
    pub class_index: usize,
}

impl RawDetection {
    fn area(&self) -> f32 {
        (self.bbox[2] - self.bbox[0]).max(0.0) * (self.bbox[3] - self.bbox[1]).max(0.0)
    }

    /// Intersection over union with `other`.
    pub fn iou(&self, other: &Self) -> f32 {
        let w = (self.bbox[2].min(other.bbox[2]) - self.bbox[0].max(other.bbox[0])).max(0.0);
        let h = (self.bbox[3].min(other.bbox[3]) - self.bbox[1].max(other.bbox[1])).max(0.0);
        let intersection = w * h;
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

/// Object detector over frames.
pub trait Detector {
    /// Detect objects in `frame`, returning boxes that pass `options`.
    fn detect(&self, frame: &Frame, options: &DetectOptions) -> Result<Vec<RawDetection>>;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn detect(&self, frame: &Frame, options: &DetectOptions) -> Result<Vec<RawDetection>> {
        (**self).detect(frame, options)
    }
}

/// Keep the highest-confidence boxes, dropping any box whose IoU with an
/// already kept box exceeds `iou_threshold`. Output is sorted by confidence.
pub fn non_max_suppression(boxes: &mut Vec<RawDetection>, iou_threshold: f32) {
    boxes.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept = 0;
    for index in 0..boxes.len() {
        let overlaps = (0..kept).any(|prev| boxes[prev].iou(&boxes[index]) > iou_threshold);
        if !overlaps {
            boxes.swap(kept, index);
            kept += 1;
        }
    }
    boxes.truncate(kept);
}

/// Apply the thresholds in `options` to raw model output.
pub fn apply_thresholds(mut boxes: Vec<RawDetection>, options: &DetectOptions) -> Vec<RawDetection> {
    boxes.retain(|b| b.confidence >= options.confidence_threshold);
    non_max_suppression(&mut boxes, options.iou_threshold);
    boxes
}

#[derive(Debug, Deserialize)]
struct ReplayLine {
    frame: u64,
    #[serde(default)]
    detections: Vec<RawDetection>,
}

/// Detector that replays precomputed boxes keyed by frame index.
///
/// Input is JSON Lines, one object per frame:
/// `{"frame": 3, "detections": [{"bbox": [x1, y1, x2, y2], "confidence": 0.9, "class": 0}]}`.
/// Frames without a line yield no detections.
#[derive(Debug, Default, Clone)]
pub struct ReplayDetector {
    frames: HashMap<u64, Vec<RawDetection>>,
}

impl ReplayDetector {
    /// Load replay data from a JSON Lines file.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::DetectorLoad {
            path: path.to_path_buf(),
            source: e.into(),
        })?;

        let mut frames: HashMap<u64, Vec<RawDetection>> = HashMap::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| Error::DetectorLoad {
                path: path.to_path_buf(),
                source: e.into(),
            })?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ReplayLine>(&line) {
                Ok(entry) => frames.entry(entry.frame).or_default().extend(entry.detections),
                Err(e) => warn!("{}:{}: skipping replay line: {e}", path.display(), index + 1),
            }
        }

        debug!("Loaded replay detections for {} frame(s)", frames.len());
        Ok(Self { frames })
    }

    /// Build a replay detector from in-memory entries.
    pub fn from_frames(frames: impl IntoIterator<Item = (u64, Vec<RawDetection>)>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }
}

impl Detector for ReplayDetector {
    fn detect(&self, frame: &Frame, options: &DetectOptions) -> Result<Vec<RawDetection>> {
        let boxes = self.frames.get(&frame.index).cloned().unwrap_or_default();
        Ok(apply_thresholds(boxes, options))
    }
}

/// Mapping from detector class index to category label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    labels: Vec<String>,
}

impl LabelMap {
    /// Build a label map.
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Label for `class_index`, if known.
    pub fn label(&self, class_index: usize) -> Option<&str> {
        self.labels.get(class_index).map(String::as_str)
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl Default for LabelMap {
    fn default() -> Self {
        Self::new(
            crate::constants::DEFAULT_LABELS
                .iter()
                .map(ToString::to_string)
                .collect(),
        )
    }
}
