//! Frame loop: skip scheduling, inference, cooldown-gated capture.

use super::annotate::{LabelFont, ceil_confidence, draw_detection, format_label, save_capture};
use super::cooldown::CooldownGate;
use super::detector::{DetectOptions, Detector, LabelMap};
use super::events::{CaptureEvent, NotificationSink};
use super::source::{Frame, FrameSource};
use crate::constants::CAPTURE_STAMP_FORMAT;
use crate::constants::stream::{DEFAULT_COOLDOWN_SECS, DEFAULT_SKIP_INTERVAL};
use crate::error::Result;
use crate::geo::{GpsTrack, LocationCell};
use crate::store::RecordStore;
use chrono::{Local, Utc};
use indicatif::ProgressBar;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Stream tuning.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Run inference on every Nth frame (at least 1).
    pub skip_interval: u64,
    /// Detector thresholds.
    pub detect: DetectOptions,
    /// Minimum time between two captures.
    pub cooldown: Duration,
    /// Where captured frames are written.
    pub captures_dir: PathBuf,
    /// Stop after this many frames.
    pub frame_limit: Option<u64>,
}

impl StreamSettings {
    /// Defaults writing captures into `captures_dir`.
    pub fn new(captures_dir: PathBuf) -> Self {
        Self {
            skip_interval: DEFAULT_SKIP_INTERVAL,
            detect: DetectOptions::default(),
            cooldown: Duration::from_secs_f64(DEFAULT_COOLDOWN_SECS),
            captures_dir,
            frame_limit: None,
        }
    }
}

/// Processor lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamState {
    /// Not started.
    Idle,
    /// Consuming frames.
    Streaming,
    /// Source exhausted, stopped or limit reached.
    Finished,
}

/// What happened to one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Not scheduled for inference.
    Skipped,
    /// Inference ran.
    Inferred {
        /// Boxes with a known label.
        detections: usize,
        /// Ids of records stored from this frame.
        captured: Vec<u64>,
    },
    /// The detector returned an error; the frame was dropped.
    DetectorFailed,
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamSummary {
    /// Frames read from the source.
    pub frames: u64,
    /// Frames passed to the detector.
    pub inferred_frames: u64,
    /// Labelled boxes across all inferred frames.
    pub detections: u64,
    /// Records stored.
    pub captures: u64,
    /// Frames dropped because the detector failed.
    pub detector_errors: u64,
    /// Captures that could not be written or stored.
    pub capture_errors: u64,
}

/// Consumes frames and turns sustained detections into stored records.
pub struct StreamProcessor<D: Detector> {
    detector: D,
    labels: LabelMap,
    store: Arc<RecordStore>,
    location: Arc<LocationCell>,
    gps: Option<GpsTrack>,
    font: Option<LabelFont>,
    cooldown: Arc<CooldownGate>,
    sinks: Vec<Box<dyn NotificationSink>>,
    settings: StreamSettings,
    stop: Arc<AtomicBool>,
    progress: Option<ProgressBar>,
    state: StreamState,
    counter: u64,
    summary: StreamSummary,
}

impl<D: Detector> StreamProcessor<D> {
    /// Build a processor with its own cooldown gate.
    pub fn new(
        detector: D,
        labels: LabelMap,
        store: Arc<RecordStore>,
        location: Arc<LocationCell>,
        settings: StreamSettings,
    ) -> Self {
        let cooldown = Arc::new(CooldownGate::new(settings.cooldown));
        Self {
            detector,
            labels,
            store,
            location,
            gps: None,
            font: None,
            cooldown,
            sinks: Vec::new(),
            settings: StreamSettings {
                skip_interval: settings.skip_interval.max(1),
                ..settings
            },
            stop: Arc::new(AtomicBool::new(false)),
            progress: None,
            state: StreamState::Idle,
            counter: 0,
            summary: StreamSummary::default(),
        }
    }

    /// Share a cooldown gate with other processors.
    #[must_use]
    pub fn with_cooldown(mut self, gate: Arc<CooldownGate>) -> Self {
        self.cooldown = gate;
        self
    }

    /// Replay GPS reports into the location cell as their frames arrive.
    #[must_use]
    pub fn with_gps_track(mut self, track: GpsTrack) -> Self {
        self.gps = Some(track);
        self
    }

    /// Write label text with `font`.
    #[must_use]
    pub fn with_label_font(mut self, font: LabelFont) -> Self {
        self.font = Some(font);
        self
    }

    /// Add a notification sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Box<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Use an external stop flag.
    #[must_use]
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Tick `progress` once per frame.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Flag that ends [`Self::run`] before the next frame.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Counters so far.
    pub fn summary(&self) -> &StreamSummary {
        &self.summary
    }

    /// Consume `source` until it is exhausted, fails, the stop flag is set
    /// or the frame limit is reached.
    pub fn run(&mut self, source: &mut dyn FrameSource) -> StreamSummary {
        if let Err(e) = std::fs::create_dir_all(&self.settings.captures_dir) {
            warn!(
                "Could not create captures directory {}: {e}",
                self.settings.captures_dir.display()
            );
        }

        self.state = StreamState::Streaming;
        info!(
            "Streaming (inference every {} frame(s), cooldown {:.1}s)",
            self.settings.skip_interval,
            self.cooldown.cooldown().as_secs_f64()
        );

        loop {
            if self.stop.load(Ordering::Relaxed) {
                info!("Stop requested, ending stream");
                break;
            }
            if let Some(limit) = self.settings.frame_limit
                && self.summary.frames >= limit
            {
                debug!("Frame limit {limit} reached");
                break;
            }

            let mut frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!("End of stream");
                    break;
                }
                Err(e) => {
                    warn!("Cannot read frame, ending stream: {e}");
                    break;
                }
            };

            self.process_frame_at(&mut frame, Instant::now());

            if let Some(pb) = &self.progress {
                pb.set_message(format!(
                    "{} frames, {} captures",
                    self.summary.frames, self.summary.captures
                ));
                pb.tick();
            }
        }

        self.state = StreamState::Finished;
        info!(
            "Stream finished: {} frames, {} inferred, {} detections, {} captures",
            self.summary.frames,
            self.summary.inferred_frames,
            self.summary.detections,
            self.summary.captures
        );
        if let Some(last) = self.cooldown.last_capture() {
            debug!("Last capture {:.1}s ago", last.elapsed().as_secs_f64());
        }
        self.summary.clone()
    }

    /// Process one frame as if it arrived at `now`.
    pub fn process_frame_at(&mut self, frame: &mut Frame, now: Instant) -> FrameOutcome {
        self.counter += 1;
        self.summary.frames += 1;

        if let Some(track) = &self.gps {
            track.apply(frame.index, &self.location, Utc::now());
        }

        if self.counter % self.settings.skip_interval != 0 {
            return FrameOutcome::Skipped;
        }

        self.summary.inferred_frames += 1;
        let boxes = match self.detector.detect(frame, &self.settings.detect) {
            Ok(boxes) => boxes,
            Err(e) => {
                warn!("Detector failed on frame {}: {e}", frame.index);
                self.summary.detector_errors += 1;
                return FrameOutcome::DetectorFailed;
            }
        };

        let mut detections = 0;
        let mut captured = Vec::new();

        for raw in boxes {
            let Some(category) = self.labels.label(raw.class_index).map(str::to_string) else {
                debug!(
                    "Ignoring box with unknown class index {} on frame {}",
                    raw.class_index, frame.index
                );
                continue;
            };
            detections += 1;

            let confidence = ceil_confidence(raw.confidence);
            draw_detection(
                &mut frame.image,
                raw.bbox,
                &format_label(&category, confidence),
                self.font.as_ref(),
            );

            if self.cooldown.try_acquire(now)
                && let Some(id) = self.capture(frame, &category, confidence)
            {
                captured.push(id);
            }
        }

        self.summary.detections += detections as u64;
        FrameOutcome::Inferred {
            detections,
            captured,
        }
    }

    fn capture(&mut self, frame: &Frame, category: &str, confidence: f64) -> Option<u64> {
        let stamp = Local::now().format(CAPTURE_STAMP_FORMAT).to_string();
        let path = self
            .settings
            .captures_dir
            .join(format!("{category}_{stamp}_{}.jpg", self.counter));

        if let Err(e) = save_capture(&frame.image, &path) {
            warn!("Could not save capture: {e}");
            self.summary.capture_errors += 1;
            return None;
        }

        let location = self.location.point();
        let id = match self.store.add(
            &path.to_string_lossy(),
            location,
            category,
            confidence,
        ) {
            Ok(id) => id,
            Err(e) => {
                warn!("Could not store detection: {e}");
                self.summary.capture_errors += 1;
                return None;
            }
        };
        self.summary.captures += 1;

        let event = CaptureEvent {
            id,
            timestamp: stamp,
            confidence,
            category: category.to_string(),
            location: location.map_or_else(
                || crate::constants::location::UNKNOWN.to_string(),
                |p| p.to_string(),
            ),
        };
        self.emit(&event);
        Some(id)
    }

    fn emit(&mut self, event: &CaptureEvent) {
        for sink in &mut self.sinks {
            if let Err(e) = sink.notify(event) {
                warn!("Notification failed: {e}");
            }
        }
    }
}

/// Run a detector once on the image at `path` and store the first labelled
/// detection, without cooldown.
///
/// The stored record points at `path` and carries the raw confidence.
/// Returns `None` when nothing was detected.
pub fn submit_image<D: Detector + ?Sized>(
    detector: &D,
    labels: &LabelMap,
    options: &DetectOptions,
    store: &RecordStore,
    path: &std::path::Path,
    location: Option<crate::geo::GeoPoint>,
) -> Result<Option<u64>> {
    let frame = Frame::load(1, path)?;
    let boxes = detector.detect(&frame, options)?;

    let Some((category, raw)) = boxes
        .iter()
        .find_map(|raw| labels.label(raw.class_index).map(|label| (label, raw)))
    else {
        info!("No detections in {}", path.display());
        return Ok(None);
    };

    let id = store.add(
        &path.to_string_lossy(),
        location,
        category,
        f64::from(raw.confidence),
    )?;
    info!("Stored {category} #{id} from {}", path.display());
    Ok(Some(id))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::geo::GeoPoint;
    use crate::store::StorePaths;
    use crate::stream::detector::RawDetection;
    use crate::stream::source::MemorySource;
    use image::RgbImage;
    use tempfile::TempDir;

    /// Reports one pothole on every call.
    struct Always;

    impl Detector for Always {
        fn detect(&self, _frame: &Frame, _options: &DetectOptions) -> Result<Vec<RawDetection>> {
            Ok(vec![RawDetection {
                bbox: [1.0, 1.0, 6.0, 6.0],
                confidence: 0.871,
                class_index: 0,
            }])
        }
    }

    struct Failing;

    impl Detector for Failing {
        fn detect(&self, _frame: &Frame, _options: &DetectOptions) -> Result<Vec<RawDetection>> {
            Err(Error::Detector {
                reason: "model crashed".to_string(),
            })
        }
    }

    fn setup<D: Detector>(detector: D, dir: &TempDir) -> (StreamProcessor<D>, Arc<RecordStore>) {
        let store = Arc::new(RecordStore::open(StorePaths::in_dir(dir.path())).unwrap());
        let location = Arc::new(LocationCell::new(Duration::from_secs(120)));
        let settings = StreamSettings::new(dir.path().join("captures"));
        std::fs::create_dir_all(&settings.captures_dir).unwrap();
        let processor =
            StreamProcessor::new(detector, LabelMap::default(), Arc::clone(&store), location, settings);
        (processor, store)
    }

    fn blank() -> Frame {
        Frame::new(0, RgbImage::new(8, 8))
    }

    #[test]
    fn test_every_third_frame_inferred() {
        let dir = TempDir::new().unwrap();
        let (mut processor, _) = setup(Always, &dir);
        let t0 = Instant::now();

        let outcomes: Vec<bool> = (0..6)
            .map(|_| processor.process_frame_at(&mut blank(), t0) != FrameOutcome::Skipped)
            .collect();
        assert_eq!(outcomes, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn test_cooldown_gates_captures() {
        let dir = TempDir::new().unwrap();
        let (mut processor, store) = setup(Always, &dir);
        let t0 = Instant::now();

        let mut captured_at = |offset: u64| {
            for _ in 0..2 {
                processor.process_frame_at(&mut blank(), t0 + Duration::from_secs(offset));
            }
            match processor.process_frame_at(&mut blank(), t0 + Duration::from_secs(offset)) {
                FrameOutcome::Inferred { captured, .. } => captured.len(),
                other => panic!("unexpected outcome {other:?}"),
            }
        };

        assert_eq!(captured_at(0), 1);
        assert_eq!(captured_at(2), 0);
        assert_eq!(captured_at(6), 1);

        let records = store.list_active().unwrap();
        assert_eq!(records.len(), 2);
        assert!((records[0].confidence - 0.88).abs() < 1e-9);
        assert_eq!(records[0].location, None);
        assert!(std::path::Path::new(&records[0].image_path).exists());
    }

    #[test]
    fn test_detector_failure_skips_frame() {
        let dir = TempDir::new().unwrap();
        let (mut processor, store) = setup(Failing, &dir);
        let mut source = MemorySource::blank(6, 8, 8);

        let summary = processor.run(&mut source);
        assert_eq!(summary.frames, 6);
        assert_eq!(summary.detector_errors, 2);
        assert_eq!(summary.captures, 0);
        assert_eq!(processor.state(), StreamState::Finished);
        assert!(store.list_active().unwrap().is_empty());
    }

    #[test]
    fn test_stop_flag_and_frame_limit() {
        let dir = TempDir::new().unwrap();
        let (mut processor, _) = setup(Always, &dir);

        processor.stop_flag().store(true, Ordering::Relaxed);
        assert_eq!(processor.run(&mut MemorySource::blank(3, 4, 4)).frames, 0);

        let (mut processor, _) = setup(Always, &dir);
        processor.settings.frame_limit = Some(4);
        assert_eq!(processor.run(&mut MemorySource::blank(10, 4, 4)).frames, 4);
    }

    #[test]
    fn test_location_attached_to_capture() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RecordStore::open(StorePaths::in_dir(dir.path())).unwrap());
        let location = Arc::new(LocationCell::pinned(GeoPoint::new(23.81, 90.41)));
        let mut settings = StreamSettings::new(dir.path().join("captures"));
        settings.skip_interval = 1;

        let mut processor =
            StreamProcessor::new(Always, LabelMap::default(), Arc::clone(&store), location, settings);
        let summary = processor.run(&mut MemorySource::blank(1, 8, 8));

        assert_eq!(summary.captures, 1);
        let record = &store.list_active().unwrap()[0];
        assert_eq!(record.location, Some(GeoPoint::new(23.81, 90.41)));
    }

    #[test]
    fn test_submit_stores_first_detection() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::open(StorePaths::in_dir(dir.path())).unwrap();
        let image_path = dir.path().join("upload.png");
        RgbImage::new(8, 8).save(&image_path).unwrap();

        let id = submit_image(
            &Always,
            &LabelMap::default(),
            &DetectOptions::default(),
            &store,
            &image_path,
            Some(GeoPoint::new(1.0, 2.0)),
        )
        .unwrap();
        assert_eq!(id, Some(1));

        let record = store.get(1).unwrap();
        assert_eq!(record.category.as_str(), "pothole");
        assert!((record.confidence - 0.871).abs() < 1e-6);
    }
}
