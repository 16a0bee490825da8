//! Detection stream processing.
//!
//! Frames flow from a [`FrameSource`] through a [`Detector`]; labelled boxes
//! are drawn onto the frame and, when the [`CooldownGate`] admits them,
//! saved as captures and appended to the record store.

mod annotate;
mod cooldown;
mod detector;
mod events;
mod processor;
mod source;

pub use annotate::{LabelFont, ceil_confidence, draw_detection, format_label, save_capture};
pub use cooldown::CooldownGate;
pub use detector::{
    DetectOptions, Detector, LabelMap, RawDetection, ReplayDetector, apply_thresholds,
    non_max_suppression,
};
pub use events::{CaptureEvent, JsonLinesSink, LogSink, NotificationSink};
pub use processor::{
    FrameOutcome, StreamProcessor, StreamSettings, StreamState, StreamSummary, submit_image,
};
pub use source::{DirectorySource, Frame, FrameSource, MemorySource};
